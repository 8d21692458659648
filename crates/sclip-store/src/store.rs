//! The event-store capability consumed by the watch loop.

use async_trait::async_trait;

use sclip_models::{Clip, StreamContext, StreamEvent, Streamer};

use crate::error::StoreResult;

/// Append-only persistence for stream contexts, events and clips.
///
/// The watch loop only ever appends rows and queries events by their
/// absolute start time; no row is updated or deleted.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Resolve a streamer row (display name for prompts).
    async fn get_streamer(&self, streamer_id: i64) -> StoreResult<Streamer>;

    /// Persist a context row, returning its generated id.
    async fn create_stream_context(&self, context: &StreamContext) -> StoreResult<i64>;

    /// Persist a batch of event rows, returning their generated ids.
    async fn create_stream_events(&self, events: &[StreamEvent]) -> StoreResult<Vec<i64>>;

    /// Events for `stream_id` with `start_secs >= start_secs`, ordered by
    /// start time.
    async fn stream_events_after(
        &self,
        start_secs: i64,
        stream_id: i64,
    ) -> StoreResult<Vec<StreamEvent>>;

    /// Persist a materialized clip row, returning its generated id.
    async fn create_clip(&self, clip: &Clip) -> StoreResult<i64>;
}
