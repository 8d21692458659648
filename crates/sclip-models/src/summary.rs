//! Wire schemas for the multimodal summarizer and the clip-finder reasoner.
//!
//! Both calls use structured output: the JSON Schema derived from these
//! types is sent as the response schema, so the model's reply deserializes
//! directly. Field doc comments become schema descriptions and are part of
//! the instruction surface.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::clip::FoundClip;

/// One event inside a segment, with times relative to the segment start.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SummaryEvent {
    /// Should be in mm:ss format.
    pub start_time: String,
    /// Should be in mm:ss format.
    pub end_time: String,
    /// Make this detailed and specific. Detail what the streamer is saying
    /// and how they interact with other people; the people's reactions are
    /// important. Do not include any timestamps in the description.
    pub description: String,
}

/// The summarizer's full answer for one segment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SegmentSummaryResponse {
    pub stream_events: Vec<SummaryEvent>,
    /// The narrative so far, updated with the events of this segment.
    pub updated_context: String,
    /// What happens in the last ~20 seconds of the segment (it cuts off).
    pub last_20_secs: String,
}

/// One clip range proposed by the reasoner, in absolute stream seconds.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FoundClipEntry {
    pub start_secs: i64,
    pub end_secs: i64,
    /// Short, clickbaity caption which references the streamer's name.
    /// No hashtags.
    pub caption: String,
    /// Why this moment could go viral.
    pub description: String,
}

/// The reasoner's full answer for one clip search.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FoundClipsResponse {
    pub found_clips: Vec<FoundClipEntry>,
}

impl From<FoundClipEntry> for FoundClip {
    fn from(entry: FoundClipEntry) -> Self {
        FoundClip {
            start_secs: entry.start_secs as f64,
            end_secs: entry.end_secs as f64,
            caption: entry.caption,
            description: entry.description,
        }
    }
}
