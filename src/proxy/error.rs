//! Proxy error taxonomy

use serde_json::Value;
use thiserror::Error;

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProxyError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error("Org ID not configured")]
    MissingOrgId,

    #[error("HTTP request failed: {message}")]
    Transport { message: String },

    #[error("Upstream responded with status {status}")]
    Upstream { status: u16, body: Value },

    #[error("Upstream returned an undecodable body: {message}")]
    InvalidBody { message: String },

    #[error("Invalid upstream url: {message}")]
    InvalidUrl { message: String },
}

impl ProxyError {
    pub fn transport(message: impl Into<String>) -> Self {
        ProxyError::Transport {
            message: message.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::MissingApiKey => "no_api_key",
            ProxyError::MissingOrgId => "no_org_id",
            ProxyError::Transport { .. } => "http_error",
            ProxyError::Upstream { .. } => "neon_error",
            ProxyError::InvalidBody { .. } => "invalid_response",
            ProxyError::InvalidUrl { .. } => "invalid_url",
        }
    }

    /// HTTP status to surface to the caller
    pub fn status(&self) -> u16 {
        match self {
            ProxyError::Upstream { status, .. } => *status,
            ProxyError::InvalidBody { .. } => 502,
            _ => 500,
        }
    }

    /// Missing credentials, only ever shown to administrators
    pub fn is_configuration(&self) -> bool {
        matches!(self, ProxyError::MissingApiKey | ProxyError::MissingOrgId)
    }
}
