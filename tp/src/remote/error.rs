//! Remote API error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the travel API
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Authentication failed ({status}): token missing, expired, or not allowed")]
    Auth { status: u16 },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RemoteError {
    /// Check if this is a rate limit error
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, RemoteError::RateLimited { .. })
    }

    /// Check if this is an authentication failure
    pub fn is_auth(&self) -> bool {
        matches!(self, RemoteError::Auth { .. })
    }

    /// Check if this error is retryable
    ///
    /// Retryable means the request may succeed if repeated unchanged; it says
    /// nothing about whether this client will repeat it.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::RateLimited { .. } => true,
            RemoteError::Auth { .. } => false,
            RemoteError::Api { status, .. } => *status >= 500,
            RemoteError::Network(_) => true,
            RemoteError::InvalidResponse(_) => false,
            RemoteError::Timeout(_) => true,
            RemoteError::Json(_) => false,
        }
    }

    /// Get the retry duration if this is a rate limit error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RemoteError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
