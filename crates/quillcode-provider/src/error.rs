//! Gateway error types.

use thiserror::Error;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur while talking to a language-model provider.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Rate limited (HTTP 429).
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        retry_after: Option<std::time::Duration>,
    },

    /// Invalid or missing credentials (HTTP 401).
    #[error("Unauthorized: invalid or missing API key")]
    Unauthorized,

    /// Account out of credit (HTTP 402).
    #[error("Payment required: insufficient account credit")]
    PaymentRequired,

    /// Provider is overloaded (HTTP 503/529).
    #[error("Provider overloaded, try again shortly")]
    Overloaded,

    /// HTTP request failed.
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// API error with status code.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid API response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request was cancelled.
    #[error("Request cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Map an HTTP status code to the corresponding error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 => Self::Unauthorized,
            402 => Self::PaymentRequired,
            429 => Self::RateLimited { retry_after: None },
            503 | 529 => Self::Overloaded,
            _ => Self::Api {
                status,
                message: message.into(),
            },
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Whether retrying the request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::RateLimited { .. }
                | GatewayError::Overloaded
                | GatewayError::Network(_)
        )
    }
}
