//! Scripted flow engine doubles shared by the unit tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use outpost_api::{
    ApiError, ApiResult, Challenge, ChallengeResponse, FlowSession, SessionFactory, Submission,
};
use serde_json::{json, Value};

pub(crate) fn challenge(component: &str) -> Challenge {
    serde_json::from_value(json!({"type": "native", "component": component})).unwrap()
}

pub(crate) fn redirect() -> Challenge {
    serde_json::from_value(json!({"type": "redirect", "to": "/"})).unwrap()
}

pub(crate) fn rejected(field: &str, code: &str) -> Challenge {
    let mut errors = serde_json::Map::new();
    errors.insert(
        field.to_string(),
        json!([{"string": "Invalid credentials", "code": code}]),
    );
    serde_json::from_value(json!({
        "type": "native",
        "component": "ak-stage-password",
        "response_errors": errors
    }))
    .unwrap()
}

/// What a scripted session observed
#[derive(Debug, Default)]
pub(crate) struct SessionLog {
    pub gets: usize,
    pub submitted: Vec<Value>,
    pub access_checks: Vec<String>,
}

/// Plays back a fixed sequence of flow engine answers
pub(crate) struct ScriptedSession {
    gets: VecDeque<ApiResult<Challenge>>,
    submissions: VecDeque<Submission>,
    access: Option<ApiResult<()>>,
    delay: Option<Duration>,
    log: Arc<Mutex<SessionLog>>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self {
            gets: VecDeque::new(),
            submissions: VecDeque::new(),
            access: None,
            delay: None,
            log: Arc::new(Mutex::new(SessionLog::default())),
        }
    }

    /// One round: `get` is returned by the fetch, `submission` by the submit
    pub fn round(mut self, get: Challenge, submission: Submission) -> Self {
        self.gets.push_back(Ok(get));
        self.submissions.push_back(submission);
        self
    }

    pub fn failing_get(mut self, error: ApiError) -> Self {
        self.gets.push_back(Err(error));
        self
    }

    pub fn access(mut self, result: ApiResult<()>) -> Self {
        self.access = Some(result);
        self
    }

    /// Sleep before answering every call
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn log(&self) -> Arc<Mutex<SessionLog>> {
        self.log.clone()
    }

    async fn pause(&self) {
        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
    }
}

#[async_trait]
impl FlowSession for ScriptedSession {
    async fn get_challenge(&mut self, _flow_slug: &str) -> ApiResult<Challenge> {
        self.pause().await;
        self.log.lock().unwrap().gets += 1;
        self.gets
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transport("script exhausted".to_string())))
    }

    async fn submit_challenge(
        &mut self,
        _flow_slug: &str,
        response: &ChallengeResponse,
    ) -> Submission {
        self.pause().await;
        self.log
            .lock()
            .unwrap()
            .submitted
            .push(serde_json::to_value(response).unwrap());
        self.submissions.pop_front().unwrap_or_else(|| {
            Submission::failed(ApiError::Transport("script exhausted".to_string()))
        })
    }

    async fn check_access(&mut self, application_slug: &str) -> ApiResult<()> {
        self.pause().await;
        self.log
            .lock()
            .unwrap()
            .access_checks
            .push(application_slug.to_string());
        self.access
            .take()
            .unwrap_or_else(|| Err(ApiError::Transport("script exhausted".to_string())))
    }
}

/// Hands out prepared sessions in order
#[derive(Default)]
pub(crate) struct ScriptedFactory {
    sessions: Mutex<VecDeque<ScriptedSession>>,
    created: Mutex<usize>,
}

impl ScriptedFactory {
    pub fn with(sessions: Vec<ScriptedSession>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(sessions.into()),
            created: Mutex::new(0),
        })
    }

    pub fn created(&self) -> usize {
        *self.created.lock().unwrap()
    }
}

impl SessionFactory for ScriptedFactory {
    fn create_session(&self) -> ApiResult<Box<dyn FlowSession>> {
        let session = self
            .sessions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ApiError::Client("no session scripted".to_string()))?;
        *self.created.lock().unwrap() += 1;
        Ok(Box::new(session))
    }
}

/// Standard identification → password → redirect flow
pub(crate) fn successful_flow() -> ScriptedSession {
    ScriptedSession::new()
        .round(
            challenge("ak-stage-identification"),
            Submission::ok(challenge("ak-stage-password")),
        )
        .round(challenge("ak-stage-password"), Submission::ok(redirect()))
}
