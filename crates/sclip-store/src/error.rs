//! Store error types.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur talking to the event store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store configuration error: {0}")]
    Config(String),

    #[error("Request failed with {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Check if the error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Network(_) => true,
            StoreError::RequestFailed { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
