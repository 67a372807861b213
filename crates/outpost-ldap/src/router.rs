//! Routes bind requests to the provider owning the bind DN

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use outpost_api::{ApiSessionFactory, SessionFactory};
use outpost_core::{Error, OutpostConfig, Result};

use crate::bind::LdapProvider;
use crate::types::{BindOutcome, BindRequest};

/// Entry point for the directory server's bind handler
pub struct BindRouter {
    /// Sorted by base DN length, longest first
    providers: Vec<LdapProvider>,
    permits: Arc<Semaphore>,
}

impl BindRouter {
    /// `max_concurrent` is capped at what a tokio semaphore can hold
    pub fn new(mut providers: Vec<LdapProvider>, max_concurrent: usize) -> Self {
        providers.sort_by(|a, b| b.base_dn().len().cmp(&a.base_dn().len()));

        Self {
            providers,
            permits: Arc::new(Semaphore::new(max_concurrent.min(Semaphore::MAX_PERMITS))),
        }
    }

    /// Build every configured provider over one HTTP session factory
    pub fn from_config(config: &OutpostConfig) -> Result<Self> {
        config.validate()?;

        let factory = ApiSessionFactory::new(config.api.clone())
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        info!(host = %factory.base_url(), "Using flow engine");

        let sessions: Arc<dyn SessionFactory> = Arc::new(factory);
        let providers = config
            .providers
            .iter()
            .map(|p| {
                info!(
                    provider = %p.name,
                    base_dn = %p.base_dn,
                    flow = %p.flow_slug,
                    application = %p.application_slug,
                    "Registered provider"
                );
                LdapProvider::new(p.clone(), &config.limits, sessions.clone())
            })
            .collect();

        Ok(Self::new(providers, config.limits.max_concurrent_binds))
    }

    pub fn providers(&self) -> &[LdapProvider] {
        &self.providers
    }

    /// Provider whose base DN is the longest suffix of `dn`.
    ///
    /// Matching is literal, the same test the provider applies when resolving.
    pub fn select(&self, dn: &str) -> Option<&LdapProvider> {
        self.providers.iter().find(|p| dn.ends_with(p.base_dn()))
    }

    pub async fn bind(&self, request: &BindRequest) -> BindOutcome {
        let Some(provider) = self.select(&request.dn) else {
            warn!(dn = %request.dn, peer = ?request.peer, "No provider for bind DN");
            return BindOutcome::OperationsError;
        };

        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return BindOutcome::OperationsError,
        };

        debug!(dn = %request.dn, peer = ?request.peer, provider = provider.name(), "Routing bind");
        provider.bind(&request.dn, &request.password).await
    }

    /// Like [`bind`](Self::bind), abandoning the attempt once `cancel` fires.
    ///
    /// An abandoned attempt drops its session; nothing from it is reused.
    pub async fn bind_with_cancel(
        &self,
        request: &BindRequest,
        cancel: &CancellationToken,
    ) -> BindOutcome {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(dn = %request.dn, "Bind cancelled");
                BindOutcome::OperationsError
            }
            outcome = self.bind(request) => outcome,
        }
    }
}

impl std::fmt::Debug for BindRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindRouter")
            .field("providers", &self.providers)
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}
