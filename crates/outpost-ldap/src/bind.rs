//! Bind orchestration for a single provider
//!
//! A bind moves through DN resolution, flow solving and the access check:
//!
//! ```text
//! Start ──resolve──▶ Resolved ──solve──▶ Solved ──check_access──▶ AccessChecked
//!   │                   │                  │                          │
//!   └─ error ───────────┴─ error/rejected ─┴──────────────────────────┴─▶ outcome
//! ```
//!
//! Every failure is turned into a [`BindOutcome`]; nothing propagates to the
//! directory server.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{info, info_span, warn, Instrument};

use outpost_api::SessionFactory;
use outpost_core::config::{LimitsConfig, ProviderConfig};

use crate::access::{check_access, AccessDecision};
use crate::dn::resolve_identity;
use crate::flow::{FlowOutcome, FlowSolver};
use crate::types::BindOutcome;

/// One configured LDAP provider
pub struct LdapProvider {
    config: ProviderConfig,
    solver: FlowSolver,
    sessions: Arc<dyn SessionFactory>,
}

impl LdapProvider {
    pub fn new(
        config: ProviderConfig,
        limits: &LimitsConfig,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        let solver = FlowSolver::new(
            config.flow_slug.clone(),
            limits.max_flow_rounds,
            limits.flow_timeout(),
        );

        Self {
            config,
            solver,
            sessions,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn base_dn(&self) -> &str {
        &self.config.base_dn
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Authenticate `dn` with `password` and check application access
    pub async fn bind(&self, dn: &str, password: &SecretString) -> BindOutcome {
        let span = info_span!("bind", provider = %self.config.name, dn = %dn);
        self.bind_inner(dn, password).instrument(span).await
    }

    async fn bind_inner(&self, dn: &str, password: &SecretString) -> BindOutcome {
        let identity = match resolve_identity(
            dn,
            &self.config.base_dn,
            &self.config.identity_attribute,
        ) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Failed to resolve bind DN");
                return BindOutcome::OperationsError;
            }
        };

        // Session state must never outlive or be shared beyond this attempt
        let mut session = match self.sessions.create_session() {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Failed to create flow session");
                return BindOutcome::OperationsError;
            }
        };

        match self.solver.solve(&identity, password, session.as_mut()).await {
            Ok(FlowOutcome::Passed) => {}
            Ok(FlowOutcome::Rejected) => {
                info!(user = %identity, "Invalid credentials");
                return BindOutcome::InvalidCredentials;
            }
            Err(e) => {
                warn!(user = %identity, error = %e, "Failed to solve challenge");
                return BindOutcome::OperationsError;
            }
        }

        match check_access(&identity, &self.config.application_slug, session.as_mut()).await {
            AccessDecision::Granted => {
                info!(user = %identity, "User has access");
                BindOutcome::Success
            }
            AccessDecision::Denied => BindOutcome::InsufficientAccessRights,
            AccessDecision::Indeterminate(_) => BindOutcome::OperationsError,
        }
    }
}

impl std::fmt::Debug for LdapProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapProvider")
            .field("config", &self.config)
            .field("solver", &self.solver)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        challenge, rejected, successful_flow, ScriptedFactory, ScriptedSession,
    };
    use outpost_api::{ApiError, Submission};
    use tracing_test::traced_test;

    const ALICE: &str = "uid=alice,ou=users,dc=example,dc=com";

    fn provider(factory: Arc<ScriptedFactory>) -> LdapProvider {
        let config = ProviderConfig {
            name: "corp".to_string(),
            base_dn: "dc=example,dc=com".to_string(),
            flow_slug: "ldap-flow".to_string(),
            application_slug: "ldap-app".to_string(),
            identity_attribute: "uid".to_string(),
        };
        LdapProvider::new(config, &LimitsConfig::default(), factory)
    }

    fn password(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[tokio::test]
    async fn test_bind_success() {
        let session = successful_flow().access(Ok(()));
        let log = session.log();
        let factory = ScriptedFactory::with(vec![session]);

        let outcome = provider(factory.clone()).bind(ALICE, &password("hunter2")).await;
        assert_eq!(outcome, BindOutcome::Success);
        assert_eq!(factory.created(), 1);

        // the access check ran on the session that completed the flow
        let log = log.lock().unwrap();
        assert_eq!(log.gets, 2);
        assert_eq!(log.access_checks, vec!["ldap-app".to_string()]);
    }

    #[tokio::test]
    async fn test_bind_wrong_password() {
        let session = ScriptedSession::new()
            .round(
                challenge("ak-stage-identification"),
                Submission::ok(challenge("ak-stage-password")),
            )
            .round(
                challenge("ak-stage-password"),
                Submission::ok(rejected("password", "invalid")),
            );
        let log = session.log();
        let factory = ScriptedFactory::with(vec![session]);

        let outcome = provider(factory).bind(ALICE, &password("wrong")).await;
        assert_eq!(outcome, BindOutcome::InvalidCredentials);
        assert!(log.lock().unwrap().access_checks.is_empty());
    }

    #[tokio::test]
    async fn test_bind_access_forbidden() {
        let session = successful_flow().access(Err(ApiError::Forbidden("denied".to_string())));
        let factory = ScriptedFactory::with(vec![session]);

        let outcome = provider(factory).bind(ALICE, &password("hunter2")).await;
        assert_eq!(outcome, BindOutcome::InsufficientAccessRights);
    }

    #[tokio::test]
    async fn test_bind_access_check_error() {
        let session = successful_flow().access(Err(ApiError::status(500, "boom")));
        let factory = ScriptedFactory::with(vec![session]);

        let outcome = provider(factory).bind(ALICE, &password("hunter2")).await;
        assert_eq!(outcome, BindOutcome::OperationsError);
    }

    #[tokio::test]
    async fn test_bind_outside_base_makes_no_calls() {
        let factory = ScriptedFactory::with(vec![successful_flow().access(Ok(()))]);

        let outcome = provider(factory.clone())
            .bind("uid=bob,dc=other,dc=com", &password("hunter2"))
            .await;
        assert_eq!(outcome, BindOutcome::OperationsError);
        assert_eq!(factory.created(), 0);
    }

    #[tokio::test]
    async fn test_bind_unresolvable_dn() {
        let factory = ScriptedFactory::with(vec![]);
        let provider = provider(factory.clone());

        for dn in [
            "ou=users,dc=example,dc=com",
            "uid=\"alice,dc=example,dc=com",
            "uid=,dc=example,dc=com",
        ] {
            let outcome = provider.bind(dn, &password("hunter2")).await;
            assert_eq!(outcome, BindOutcome::OperationsError, "dn {dn}");
        }
        assert_eq!(factory.created(), 0);
    }

    #[tokio::test]
    async fn test_bind_session_creation_failure() {
        let factory = ScriptedFactory::with(vec![]);

        let outcome = provider(factory).bind(ALICE, &password("hunter2")).await;
        assert_eq!(outcome, BindOutcome::OperationsError);
    }

    #[tokio::test]
    async fn test_bind_flow_transport_error() {
        let session = ScriptedSession::new().failing_get(ApiError::Transport("refused".into()));
        let factory = ScriptedFactory::with(vec![session]);

        let outcome = provider(factory).bind(ALICE, &password("hunter2")).await;
        assert_eq!(outcome, BindOutcome::OperationsError);
    }

    #[tokio::test]
    async fn test_bind_unsupported_stage() {
        let session = ScriptedSession::new().round(
            challenge("ak-stage-consent"),
            Submission::ok(challenge("ak-stage-password")),
        );
        let factory = ScriptedFactory::with(vec![session]);

        let outcome = provider(factory).bind(ALICE, &password("hunter2")).await;
        assert_eq!(outcome, BindOutcome::OperationsError);
    }

    #[tokio::test]
    async fn test_concurrent_binds_use_isolated_sessions() {
        let first = successful_flow().access(Ok(()));
        let second = successful_flow().access(Ok(()));
        let logs = [first.log(), second.log()];
        let factory = ScriptedFactory::with(vec![first, second]);
        let provider = provider(factory.clone());

        let alice_pw = password("alice-pw");
        let bob_pw = password("bob-pw");
        let (a, b) = tokio::join!(
            provider.bind(ALICE, &alice_pw),
            provider.bind("uid=bob,ou=users,dc=example,dc=com", &bob_pw),
        );
        assert_eq!(a, BindOutcome::Success);
        assert_eq!(b, BindOutcome::Success);
        assert_eq!(factory.created(), 2);

        let mut seen = Vec::new();
        for log in &logs {
            let log = log.lock().unwrap();
            // each session counted only its own rounds
            assert_eq!(log.gets, 2);
            assert_eq!(log.submitted.len(), 2);
            let user = log.submitted[0]["uid_field"].as_str().unwrap().to_string();
            let secret = log.submitted[1]["password"].as_str().unwrap().to_string();
            assert_eq!(secret, format!("{user}-pw"));
            seen.push(user);
        }
        seen.sort();
        assert_eq!(seen, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_secret_never_logged() {
        let factory = ScriptedFactory::with(vec![
            successful_flow().access(Ok(())),
            ScriptedSession::new().round(
                challenge("ak-stage-password"),
                Submission::failed(ApiError::status(500, "internal")),
            ),
            successful_flow().access(Err(ApiError::Forbidden("denied".into()))),
        ]);
        let provider = provider(factory);
        let secret = password("correct-horse-battery");

        assert_eq!(provider.bind(ALICE, &secret).await, BindOutcome::Success);
        assert_eq!(
            provider.bind(ALICE, &secret).await,
            BindOutcome::OperationsError
        );
        assert_eq!(
            provider.bind(ALICE, &secret).await,
            BindOutcome::InsufficientAccessRights
        );

        assert!(logs_contain("uid=alice"));
        assert!(logs_contain("User has access"));
        assert!(logs_contain("Access denied for user"));
        assert!(!logs_contain("correct-horse-battery"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_echoed_response_body_not_logged() {
        let echoed = r#"{"password":"correct-horse-battery"}"#;
        let factory = ScriptedFactory::with(vec![
            ScriptedSession::new().round(
                challenge("ak-stage-password"),
                Submission::failed(ApiError::status(400, echoed)),
            ),
            ScriptedSession::new().failing_get(ApiError::status(502, echoed)),
            successful_flow().access(Err(ApiError::status(500, echoed))),
            successful_flow().access(Err(ApiError::Forbidden(echoed.to_string()))),
        ]);
        let provider = provider(factory);
        let secret = password("correct-horse-battery");

        for expected in [
            BindOutcome::OperationsError,
            BindOutcome::OperationsError,
            BindOutcome::OperationsError,
            BindOutcome::InsufficientAccessRights,
        ] {
            assert_eq!(provider.bind(ALICE, &secret).await, expected);
        }

        assert!(logs_contain("Request failed with status 400"));
        assert!(logs_contain("Request failed with status 502"));
        assert!(!logs_contain("correct-horse-battery"));
    }
}
