//! Watcher error types.

use thiserror::Error;

pub type WatcherResult<T> = Result<T, WatcherError>;

/// Errors that end a watch session (or a single collaborator call).
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("AI call failed: {0}")]
    AiFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timestamp error: {0}")]
    Timecode(#[from] sclip_models::TimecodeError),

    #[error("Media error: {0}")]
    Media(#[from] sclip_media::MediaError),

    #[error("Store error: {0}")]
    Store(#[from] sclip_store::StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] sclip_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatcherError {
    pub fn ai_failed(msg: impl Into<String>) -> Self {
        Self::AiFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
