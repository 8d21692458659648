//! Watcher configuration.

use std::path::PathBuf;

use crate::error::{WatcherError, WatcherResult};

/// Watch session configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Stream URL handed to the capture process
    pub stream_url: String,
    /// Stream row id used to tag persisted events/contexts/clips
    pub stream_id: i64,
    /// Segment length in seconds
    pub segment_secs: u32,
    /// Seconds prepended to each found clip
    pub buf_start_secs: f64,
    /// Seconds appended to each found clip
    pub buf_end_secs: f64,
    /// Where segment files are recorded (one subdirectory per stream)
    pub recorded_vids_dir: PathBuf,
    /// Where finished cut files are written
    pub clips_dir: PathBuf,
    /// Streamer display name; looked up in the store when not set
    pub streamer_name: Option<String>,
    /// Streamer row id for the name lookup
    pub streamer_id: Option<i64>,
}

impl WatcherConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WatcherResult<Self> {
        let stream_url = std::env::var("STREAM_URL")
            .map_err(|_| WatcherError::config_error("STREAM_URL not set"))?;
        let stream_id = std::env::var("STREAM_ID")
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| WatcherError::config_error("STREAM_ID not set or not an integer"))?;

        Ok(Self {
            stream_url,
            stream_id,
            segment_secs: env_or("SEGMENT_SECS", 120),
            buf_start_secs: env_or("BUF_START_SECS", 0.0),
            buf_end_secs: env_or("BUF_END_SECS", 20.0),
            recorded_vids_dir: std::env::var("RECORDED_VIDS_DIR")
                .unwrap_or_else(|_| "recorded-vids".to_string())
                .into(),
            clips_dir: std::env::var("CLIPS_DIR")
                .unwrap_or_else(|_| "/tmp/streamclip/clips".to_string())
                .into(),
            streamer_name: std::env::var("STREAMER_NAME").ok(),
            streamer_id: std::env::var("STREAMER_ID").ok().and_then(|s| s.parse().ok()),
        })
    }

    /// Directory the recorder writes this stream's segments into.
    pub fn output_dir(&self) -> PathBuf {
        self.recorded_vids_dir.join(slugify(&self.stream_url))
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Reduce a stream URL to a filesystem-safe directory name.
fn slugify(url: &str) -> String {
    let slug: String = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    slug.trim_matches('-').to_string()
}
