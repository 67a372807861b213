//! Outpost LDAP - bind handling
//!
//! Turns an LDAP simple bind into a run of the configured authentication
//! flow followed by an application access check:
//!
//! 1. [`dn::resolve_identity`] extracts the user identifier from the bind DN
//! 2. [`flow::FlowSolver`] answers the flow's challenges with it and the password
//! 3. [`access::check_access`] asks whether the user may use the application
//!
//! [`LdapProvider`] runs those steps for one provider and [`BindRouter`]
//! picks the provider for a bind DN.

pub mod access;
pub mod bind;
pub mod dn;
pub mod flow;
pub mod router;
pub mod types;

#[cfg(test)]
mod testing;

pub use access::AccessDecision;
pub use bind::LdapProvider;
pub use dn::{DistinguishedName, DnError, ResolvedIdentity};
pub use flow::{FlowOutcome, FlowSolver, SolveError};
pub use router::BindRouter;
pub use types::{BindOutcome, BindRequest};
