//! The model-facing capabilities consumed by the watch loop.

use std::path::Path;

use async_trait::async_trait;

use sclip_models::{FoundClip, SegmentSummaryResponse};

use crate::error::WatcherResult;

/// Summarizes one segment of the stream with the surrounding narrative.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Describe `segment` given the rolling `context` and the `last_tail`
    /// of the previous segment. Event times in the response are relative
    /// to the segment start.
    async fn summarize_segment(
        &self,
        segment: &Path,
        context: &str,
        last_tail: &str,
        streamer_name: &str,
    ) -> WatcherResult<SegmentSummaryResponse>;
}

/// Reasons over accumulated event descriptions to propose clip ranges.
#[async_trait]
pub trait ClipReasoner: Send + Sync {
    /// Run the prepared reasoning prompt; an empty list is a normal answer.
    async fn propose_clips(&self, prompt: &str) -> WatcherResult<Vec<FoundClip>>;
}
