//! HTTP session against the flow engine
//!
//! Every session owns its own `reqwest` client with:
//! - A private cookie store (flow state never leaks between attempts)
//! - Request and connect timeouts
//! - Optional TLS certificate verification

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use outpost_core::config::ApiConfig;
use outpost_core::LDAP_FLOW_QUERY;

use crate::error::{ApiError, ApiResult};
use crate::session::{FlowSession, SessionFactory, Submission};
use crate::types::{Challenge, ChallengeResponse};

const USER_AGENT: &str = concat!("outpost-ldap/", env!("CARGO_PKG_VERSION"));

/// Builds one [`ApiSession`] per bind attempt
#[derive(Debug, Clone)]
pub struct ApiSessionFactory {
    config: ApiConfig,
    base_url: Url,
}

impl ApiSessionFactory {
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let mut base_url = Url::parse(&config.host)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", config.host, e)))?;

        // Url::join replaces the last path segment unless the base ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { config, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Create a session with a fresh cookie store
    pub fn session(&self) -> ApiResult<ApiSession> {
        let mut builder = ClientBuilder::new()
            .cookie_store(true)
            .timeout(self.config.request_timeout())
            .connect_timeout(self.config.connect_timeout())
            .user_agent(USER_AGENT);

        if !self.config.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(ApiSession {
            client,
            base_url: self.base_url.clone(),
        })
    }
}

impl SessionFactory for ApiSessionFactory {
    fn create_session(&self) -> ApiResult<Box<dyn FlowSession>> {
        Ok(Box::new(self.session()?))
    }
}

/// Cookie-carrying client for one bind attempt
pub struct ApiSession {
    client: Client,
    base_url: Url,
}

impl ApiSession {
    fn executor_url(&self, flow_slug: &str) -> ApiResult<Url> {
        let path = format!(
            "api/v2beta/flows/executor/{}/",
            urlencoding::encode(flow_slug)
        );
        let mut url = self
            .base_url
            .join(&path)
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut().append_pair("query", LDAP_FLOW_QUERY);
        Ok(url)
    }

    fn check_access_url(&self, application_slug: &str) -> ApiResult<Url> {
        let path = format!(
            "api/v2beta/core/applications/{}/check_access/",
            urlencoding::encode(application_slug)
        );
        self.base_url
            .join(&path)
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))
    }
}

/// Decode a challenge body, keeping the HTTP status as an error when it is
/// not a success
async fn read_challenge(response: Response) -> Submission {
    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => return Submission::failed(e.into()),
    };

    if status.is_success() {
        return match serde_json::from_str::<Challenge>(&body) {
            Ok(challenge) => Submission::ok(challenge),
            Err(e) => Submission::failed(e.into()),
        };
    }

    Submission {
        challenge: serde_json::from_str::<Challenge>(&body).ok(),
        error: Some(ApiError::status(status.as_u16(), &body)),
    }
}

#[async_trait]
impl FlowSession for ApiSession {
    async fn get_challenge(&mut self, flow_slug: &str) -> ApiResult<Challenge> {
        let url = self.executor_url(flow_slug)?;
        debug!(flow = flow_slug, "Fetching challenge");

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::status(status.as_u16(), &body));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn submit_challenge(
        &mut self,
        flow_slug: &str,
        response: &ChallengeResponse,
    ) -> Submission {
        let url = match self.executor_url(flow_slug) {
            Ok(url) => url,
            Err(e) => return Submission::failed(e),
        };
        debug!(flow = flow_slug, component = %response.stage(), "Submitting challenge");

        match self.client.post(url).json(response).send().await {
            Ok(resp) => read_challenge(resp).await,
            Err(e) => Submission::failed(e.into()),
        }
    }

    async fn check_access(&mut self, application_slug: &str) -> ApiResult<()> {
        let url = self.check_access_url(application_slug)?;

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::FORBIDDEN {
            return Err(ApiError::Forbidden(body));
        }

        warn!(
            application = application_slug,
            status = status.as_u16(),
            "Unexpected check_access status"
        );
        Err(ApiError::status(status.as_u16(), &body))
    }
}

impl std::fmt::Debug for ApiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSession")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}
