//! Clip ranges: model-proposed, buffer-expanded, and persisted.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A clip range proposed by the reasoner, in absolute stream seconds.
///
/// Not yet materialized; `end_secs > start_secs` by contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundClip {
    pub start_secs: f64,
    pub end_secs: f64,
    pub caption: String,
    pub description: String,
}

impl FoundClip {
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// A found clip expanded by head/tail margins and clamped to the
/// duration recorded so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferedClip {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl BufferedClip {
    /// Expand `clip` by the configured margins, clamped to `[0, total_secs]`.
    pub fn new(clip: &FoundClip, buf_start: f64, buf_end: f64, total_secs: f64) -> Self {
        Self {
            start_secs: (clip.start_secs - buf_start).max(0.0),
            end_secs: (clip.end_secs + buf_end).min(total_secs),
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// A persisted clip row, written once the cut file has been uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clip {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub stream_id: i64,
    pub start_secs: i64,
    pub end_secs: i64,
    pub caption: String,
    pub description: String,
    pub buffer_start_secs: i64,
    pub buffer_end_secs: i64,
    pub url: String,
}

/// What the watch loop emits for each materialized clip.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedClipResult {
    /// Local path of the cut file.
    pub output_path: PathBuf,
    pub found_clip: FoundClip,
    pub buffer_start_secs: f64,
    pub buffer_end_secs: f64,
}
