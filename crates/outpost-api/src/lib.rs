//! Outpost API - flow engine client
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 SessionFactory                   │
//! │   one fresh FlowSession (own cookie jar) per     │
//! │   bind attempt                                   │
//! └────────────────────────┬─────────────────────────┘
//!                          │
//!        ┌─────────────────┼──────────────────┐
//!        │                 │                  │
//!  get_challenge    submit_challenge     check_access
//!   GET executor      POST executor      GET application
//! ```
//!
//! The [`FlowSession`] trait is the seam between the bind logic and HTTP;
//! [`ApiSession`] implements it with `reqwest`.

mod client;
mod error;
mod session;
mod types;

pub use client::{ApiSession, ApiSessionFactory};
pub use error::{ApiError, ApiResult};
pub use session::{FlowSession, SessionFactory, Submission};
pub use types::{Challenge, ChallengeResponse, ChallengeType, ErrorDetail, StageKind};
