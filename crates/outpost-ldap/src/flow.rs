//! Flow challenge solver
//!
//! Answers the flow engine's challenges with the credentials of a bind
//! request until the flow redirects (authenticated), reports a validation
//! error (bad credentials), or fails.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, warn};

use outpost_api::{ApiError, ChallengeResponse, FlowSession, StageKind};

use crate::dn::ResolvedIdentity;

/// How a completed flow ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    /// The flow redirected: the credentials were accepted
    Passed,
    /// A stage reported a validation error: the credentials were rejected
    Rejected,
}

/// Reasons a flow could not be brought to a decision
#[derive(Error, Debug)]
pub enum SolveError {
    #[error("Failed to get challenge: {0}")]
    Fetch(#[source] ApiError),

    #[error("Failed to submit challenge: {0}")]
    Submit(#[source] ApiError),

    #[error("Unsupported challenge type: {0:?}")]
    UnsupportedStage(String),

    #[error("Flow engine returned neither a challenge nor an error")]
    EmptyResponse,

    #[error("Flow did not finish within {0} rounds")]
    RoundLimit(u32),

    #[error("Flow did not finish within {0:?}")]
    Timeout(Duration),
}

/// Drives one flow for one bind attempt
#[derive(Debug, Clone)]
pub struct FlowSolver {
    flow_slug: String,
    max_rounds: u32,
    timeout: Duration,
}

impl FlowSolver {
    pub fn new(flow_slug: impl Into<String>, max_rounds: u32, timeout: Duration) -> Self {
        Self {
            flow_slug: flow_slug.into(),
            max_rounds,
            timeout,
        }
    }

    pub fn flow_slug(&self) -> &str {
        &self.flow_slug
    }

    /// Run the flow to a decision over `session`.
    ///
    /// `Ok(Rejected)` means the flow engine refused the credentials; `Err`
    /// means no decision could be reached.
    pub async fn solve(
        &self,
        identity: &ResolvedIdentity,
        secret: &SecretString,
        session: &mut dyn FlowSession,
    ) -> Result<FlowOutcome, SolveError> {
        match tokio::time::timeout(self.timeout, self.run(identity, secret, session)).await {
            Ok(result) => result,
            Err(_) => Err(SolveError::Timeout(self.timeout)),
        }
    }

    async fn run(
        &self,
        identity: &ResolvedIdentity,
        secret: &SecretString,
        session: &mut dyn FlowSession,
    ) -> Result<FlowOutcome, SolveError> {
        for round in 1..=self.max_rounds {
            let challenge = session
                .get_challenge(&self.flow_slug)
                .await
                .map_err(|e| {
                    warn!(flow = %self.flow_slug, error = %e, "Failed to get challenge");
                    SolveError::Fetch(e)
                })?;
            debug!(
                round,
                component = %challenge.component,
                challenge_type = %challenge.challenge_type,
                "Got challenge"
            );

            let response = respond_to(&challenge.component, identity, secret)?;
            let submission = session.submit_challenge(&self.flow_slug, &response).await;

            // a redirect finishes the flow even when the call also reported an error
            if let Some(next) = &submission.challenge {
                debug!(
                    round,
                    component = %next.component,
                    challenge_type = %next.challenge_type,
                    "Got response"
                );
                if next.is_redirect() {
                    return Ok(FlowOutcome::Passed);
                }
            }

            if let Some(e) = submission.error {
                warn!(flow = %self.flow_slug, error = %e, "Failed to submit challenge");
                return Err(SolveError::Submit(e));
            }

            let Some(next) = submission.challenge else {
                return Err(SolveError::EmptyResponse);
            };

            if let Some((field, detail)) = next.first_error() {
                debug!(field, code = %detail.code, "{}", detail.string);
                return Ok(FlowOutcome::Rejected);
            }
        }

        warn!(flow = %self.flow_slug, rounds = self.max_rounds, "Flow round limit reached");
        Err(SolveError::RoundLimit(self.max_rounds))
    }
}

/// Build the answer for a stage; stages without a local answer fail closed
fn respond_to(
    stage: &StageKind,
    identity: &ResolvedIdentity,
    secret: &SecretString,
) -> Result<ChallengeResponse, SolveError> {
    match stage {
        StageKind::Identification => Ok(ChallengeResponse::Identification {
            uid_field: identity.as_str().to_string(),
        }),
        StageKind::Password => Ok(ChallengeResponse::Password {
            password: SecretString::from(secret.expose_secret().to_string()),
        }),
        StageKind::Other(component) => Err(SolveError::UnsupportedStage(component.clone())),
    }
}
