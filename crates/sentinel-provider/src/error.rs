//! Error taxonomy for the provider client (C9).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned non-2xx status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed provider stream chunk: {0}")]
    MalformedChunk(String),

    #[error("provider call cancelled")]
    Cancelled,

    #[error("provider health check failed: {0}")]
    HealthCheck(String),
}

impl ProviderError {
    /// Whether retrying the same request is reasonable: connection-level
    /// failures and 5xx responses are, 4xx responses and cancellation are
    /// not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Request(e) => !e.is_builder() && !e.is_redirect(),
            ProviderError::Status { status, .. } => *status >= 500,
            ProviderError::MalformedChunk(_) => false,
            ProviderError::Cancelled => false,
            ProviderError::HealthCheck(_) => true,
        }
    }
}
