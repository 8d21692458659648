//! Segment duration probing via ffprobe.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

/// Capability to measure the exact duration of a media file.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Duration of the file in seconds.
    async fn duration(&self, path: &Path) -> MediaResult<f64>;
}

/// ffprobe-backed [`MediaProbe`].
#[derive(Debug, Clone, Default)]
pub struct FfprobeClient;

impl FfprobeClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaProbe for FfprobeClient {
    async fn duration(&self, path: &Path) -> MediaResult<f64> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::FfprobeFailed {
                message: format!("ffprobe failed for {}", path.display()),
                stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
            });
        }

        let raw = String::from_utf8_lossy(&output.stdout).trim().to_string();
        raw.parse::<f64>()
            .map_err(|_| MediaError::InvalidDuration(raw))
    }
}
