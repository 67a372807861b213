//! Per-attempt session abstraction

use async_trait::async_trait;

use crate::error::{ApiError, ApiResult};
use crate::types::{Challenge, ChallengeResponse};

/// Result of submitting a challenge response.
///
/// The flow engine may deliver a challenge together with an error (for
/// example a redirect carried by a non-2xx status), so both halves are kept.
#[derive(Debug, Default)]
pub struct Submission {
    pub challenge: Option<Challenge>,
    pub error: Option<ApiError>,
}

impl Submission {
    pub fn ok(challenge: Challenge) -> Self {
        Self {
            challenge: Some(challenge),
            error: None,
        }
    }

    pub fn failed(error: ApiError) -> Self {
        Self {
            challenge: None,
            error: Some(error),
        }
    }
}

/// Stateful conversation with the flow engine for exactly one bind attempt.
///
/// Server-side flow state lives in the session's cookies, so every call of
/// an attempt must go through the same session and no session may be shared
/// between attempts.
#[async_trait]
pub trait FlowSession: Send {
    /// Fetch the current challenge of `flow_slug`
    async fn get_challenge(&mut self, flow_slug: &str) -> ApiResult<Challenge>;

    /// Answer the current challenge of `flow_slug`
    async fn submit_challenge(
        &mut self,
        flow_slug: &str,
        response: &ChallengeResponse,
    ) -> Submission;

    /// Check whether the session's user may access `application_slug`.
    ///
    /// Returns [`ApiError::Forbidden`] when access is denied.
    async fn check_access(&mut self, application_slug: &str) -> ApiResult<()>;
}

/// Creates isolated sessions
pub trait SessionFactory: Send + Sync {
    fn create_session(&self) -> ApiResult<Box<dyn FlowSession>>;
}
