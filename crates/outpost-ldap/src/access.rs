//! Post-authentication application access check

use tracing::{debug, info, warn};

use outpost_api::{ApiError, FlowSession};

use crate::dn::ResolvedIdentity;

/// Result of asking whether an authenticated user may use an application
#[derive(Debug)]
pub enum AccessDecision {
    Granted,
    Denied,
    /// The check itself failed; no decision was made
    Indeterminate(ApiError),
}

/// Check access for the user authenticated in `session`.
///
/// The session must be the one that completed the flow; its cookies are what
/// identify the user to the authorization endpoint. Not retried.
pub async fn check_access(
    identity: &ResolvedIdentity,
    application_slug: &str,
    session: &mut dyn FlowSession,
) -> AccessDecision {
    debug!(user = %identity, application = application_slug, "Checking application access");

    match session.check_access(application_slug).await {
        Ok(()) => AccessDecision::Granted,
        Err(ApiError::Forbidden(_)) => {
            info!(user = %identity, application = application_slug, "Access denied for user");
            AccessDecision::Denied
        }
        Err(e) => {
            warn!(user = %identity, application = application_slug, error = %e, "Failed to check access");
            AccessDecision::Indeterminate(e)
        }
    }
}
