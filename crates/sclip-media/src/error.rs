//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during capture, probing and cutting.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("streamlink not found in PATH")]
    StreamlinkNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("stream capture failed: {message}")]
    CaptureFailed {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("invalid duration '{0}' reported by ffprobe")]
    InvalidDuration(String),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("clip end {end_secs:.1}s exceeds recorded duration {total_secs:.1}s")]
    ClipOutOfRange { end_secs: f64, total_secs: f64 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a capture (streamlink) failure error.
    pub fn capture_failed(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::CaptureFailed {
            message: message.into(),
            exit_code,
        }
    }
}
