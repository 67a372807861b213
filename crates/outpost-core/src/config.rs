//! Configuration for Outpost

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutpostConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl OutpostConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigRead(format!("{}: {}", path, e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from `OUTPOST_*` variables resolved through `lookup`.
    ///
    /// A single provider is configured when `OUTPOST_BASE_DN` is present.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = lookup("OUTPOST_HOST") {
            config.api.host = host;
        }
        if let Some(insecure) = lookup("OUTPOST_INSECURE") {
            config.api.verify_tls = !is_truthy(&insecure);
        }
        if let Some(secs) = lookup("OUTPOST_REQUEST_TIMEOUT").and_then(|v| v.parse().ok()) {
            config.api.request_timeout_secs = secs;
        }
        if let Some(max) = lookup("OUTPOST_MAX_CONCURRENT_BINDS").and_then(|v| v.parse().ok()) {
            config.limits.max_concurrent_binds = max;
        }
        if let Some(rounds) = lookup("OUTPOST_MAX_FLOW_ROUNDS").and_then(|v| v.parse().ok()) {
            config.limits.max_flow_rounds = rounds;
        }
        if let Some(secs) = lookup("OUTPOST_FLOW_TIMEOUT").and_then(|v| v.parse().ok()) {
            config.limits.flow_timeout_secs = secs;
        }
        if let Some(level) = lookup("OUTPOST_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = lookup("OUTPOST_LOG_FORMAT") {
            config.logging.format = format;
        }

        if let Some(base_dn) = lookup("OUTPOST_BASE_DN") {
            let mut provider = ProviderConfig {
                base_dn,
                ..Default::default()
            };
            if let Some(name) = lookup("OUTPOST_PROVIDER_NAME") {
                provider.name = name;
            }
            if let Some(flow) = lookup("OUTPOST_FLOW_SLUG") {
                provider.flow_slug = flow;
            }
            if let Some(app) = lookup("OUTPOST_APP_SLUG") {
                provider.application_slug = app;
            }
            if let Some(attr) = lookup("OUTPOST_IDENTITY_ATTRIBUTE") {
                provider.identity_attribute = attr;
            }
            config.providers.push(provider);
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        self.api.validate()?;
        self.limits.validate()?;

        if self.providers.is_empty() {
            return Err(Error::NoProviders);
        }

        let mut names = HashSet::new();
        for provider in &self.providers {
            provider.validate()?;
            if !names.insert(provider.name.as_str()) {
                return Err(Error::DuplicateProvider(provider.name.clone()));
            }
        }

        Ok(())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Connection settings for the flow engine API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the flow engine, e.g. "https://auth.example.com"
    #[serde(default = "default_host")]
    pub host: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Verify the flow engine's TLS certificate
    #[serde(default = "default_true")]
    pub verify_tls: bool,
}

fn default_host() -> String {
    "http://localhost:9000".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            verify_tls: true,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.host)
            .map_err(|e| Error::InvalidArgument(format!("api.host {:?}: {}", self.host, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::InvalidArgument(
                "api.host must start with http:// or https://".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidArgument(
                "api.request_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Resource bounds applied to every bind attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of bind attempts in flight at once
    #[serde(default = "default_max_concurrent_binds")]
    pub max_concurrent_binds: usize,

    /// Maximum challenge/response rounds before a flow is abandoned
    #[serde(default = "default_max_flow_rounds")]
    pub max_flow_rounds: u32,

    /// Deadline for a complete flow in seconds
    #[serde(default = "default_flow_timeout")]
    pub flow_timeout_secs: u64,
}

fn default_max_concurrent_binds() -> usize {
    64
}

fn default_max_flow_rounds() -> u32 {
    crate::DEFAULT_MAX_FLOW_ROUNDS
}

fn default_flow_timeout() -> u64 {
    30
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_binds: default_max_concurrent_binds(),
            max_flow_rounds: default_max_flow_rounds(),
            flow_timeout_secs: default_flow_timeout(),
        }
    }
}

impl LimitsConfig {
    pub fn flow_timeout(&self) -> Duration {
        Duration::from_secs(self.flow_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_binds == 0 {
            return Err(Error::InvalidArgument(
                "limits.max_concurrent_binds must be greater than zero".into(),
            ));
        }
        if self.max_concurrent_binds > crate::MAX_CONCURRENT_BINDS {
            return Err(Error::InvalidArgument(format!(
                "limits.max_concurrent_binds must not exceed {}",
                crate::MAX_CONCURRENT_BINDS
            )));
        }
        if self.max_flow_rounds == 0 {
            return Err(Error::InvalidArgument(
                "limits.max_flow_rounds must be greater than zero".into(),
            ));
        }
        if self.flow_timeout_secs == 0 {
            return Err(Error::InvalidArgument(
                "limits.flow_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// One LDAP provider: a directory subtree backed by a flow and an application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Human-readable provider name, used in logs
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Subtree root; bind DNs must end with this string.
    /// Include the leading separator (",dc=example,dc=com") to avoid
    /// matching sibling subtrees such as "dc=badexample,dc=com".
    pub base_dn: String,

    /// Slug of the authentication flow driven for each bind
    #[serde(default = "default_flow_slug")]
    pub flow_slug: String,

    /// Slug of the application the user must be allowed to access
    #[serde(default)]
    pub application_slug: String,

    /// Attribute type in the bind DN that carries the login name
    #[serde(default = "default_identity_attribute")]
    pub identity_attribute: String,
}

fn default_provider_name() -> String {
    "ldap".to_string()
}

fn default_flow_slug() -> String {
    "default-authentication-flow".to_string()
}

fn default_identity_attribute() -> String {
    crate::DEFAULT_IDENTITY_ATTRIBUTE.to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_dn: String::new(),
            flow_slug: default_flow_slug(),
            application_slug: String::new(),
            identity_attribute: default_identity_attribute(),
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidArgument("provider name is required".into()));
        }
        if self.base_dn.trim().is_empty() {
            return Err(Error::InvalidArgument(format!(
                "provider {}: base_dn is required",
                self.name
            )));
        }
        if self.flow_slug.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "provider {}: flow_slug is required",
                self.name
            )));
        }
        if self.application_slug.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "provider {}: application_slug is required",
                self.name
            )));
        }
        if self.identity_attribute.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "provider {}: identity_attribute is required",
                self.name
            )));
        }
        Ok(())
    }
}
