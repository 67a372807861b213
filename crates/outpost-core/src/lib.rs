//! Outpost Core Library
//!
//! Configuration, error types and shared constants for the LDAP bind bridge.

pub mod config;
pub mod error;

pub use config::{OutpostConfig, ProviderConfig};
pub use error::{Error, Result};

/// Outpost version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Query string sent with every flow executor call so the flow engine knows
/// the interaction originated from the LDAP outpost
pub const LDAP_FLOW_QUERY: &str = "ldap=true";

/// Default attribute type carrying the login name in a bind DN
pub const DEFAULT_IDENTITY_ATTRIBUTE: &str = "cn";

/// Default upper bound on challenge/response rounds per bind
pub const DEFAULT_MAX_FLOW_ROUNDS: u32 = 10;

/// Largest accepted `limits.max_concurrent_binds`
pub const MAX_CONCURRENT_BINDS: usize = 65_536;
