//! Flow engine API error types

use thiserror::Error;

/// Result type for flow engine calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Longest response body kept in an error message
const MAX_BODY_IN_ERROR: usize = 512;

/// Errors raised while talking to the flow engine.
///
/// Response bodies are kept for callers but never rendered by `Display`,
/// since an engine may echo submitted credentials back.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Access forbidden")]
    Forbidden(String),

    #[error("Request failed with status {status}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Build a status error, truncating oversized bodies
    pub fn status(status: u16, body: &str) -> Self {
        let body = match body.char_indices().nth(MAX_BODY_IN_ERROR) {
            Some((idx, _)) => format!("{}...", &body[..idx]),
            None => body.to_string(),
        };
        ApiError::Status { status, body }
    }

    /// Response body carried by the error, if any
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::Status { body, .. } | ApiError::Forbidden(body) => Some(body),
            _ => None,
        }
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, ApiError::Forbidden(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_builder() {
            ApiError::Client(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}
