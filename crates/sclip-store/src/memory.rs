//! In-memory event store for tests and dry runs.

use std::sync::Mutex;

use async_trait::async_trait;

use sclip_models::{Clip, StreamContext, StreamEvent, Streamer};

use crate::error::{StoreError, StoreResult};
use crate::store::EventStore;

/// An [`EventStore`] backed by plain vectors. Ids are assigned from a
/// per-table counter starting at 1.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    streamers: Vec<Streamer>,
    contexts: Vec<StreamContext>,
    events: Vec<StreamEvent>,
    clips: Vec<Clip>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a streamer row, returning its id.
    pub fn add_streamer(&self, name: impl Into<String>) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.streamers.len() as i64 + 1;
        inner.streamers.push(Streamer {
            id: Some(id),
            name: name.into(),
        });
        id
    }

    /// Snapshot of all persisted events.
    pub fn events(&self) -> Vec<StreamEvent> {
        self.inner.lock().unwrap().events.clone()
    }

    /// Snapshot of all persisted contexts, oldest first.
    pub fn contexts(&self) -> Vec<StreamContext> {
        self.inner.lock().unwrap().contexts.clone()
    }

    /// Snapshot of all persisted clips.
    pub fn clips(&self) -> Vec<Clip> {
        self.inner.lock().unwrap().clips.clone()
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn get_streamer(&self, streamer_id: i64) -> StoreResult<Streamer> {
        self.inner
            .lock()
            .unwrap()
            .streamers
            .iter()
            .find(|s| s.id == Some(streamer_id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("streamer {streamer_id}")))
    }

    async fn create_stream_context(&self, context: &StreamContext) -> StoreResult<i64> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.contexts.len() as i64 + 1;
        let mut row = context.clone();
        row.id = Some(id);
        inner.contexts.push(row);
        Ok(id)
    }

    async fn create_stream_events(&self, events: &[StreamEvent]) -> StoreResult<Vec<i64>> {
        let mut inner = self.inner.lock().unwrap();
        let mut ids = Vec::with_capacity(events.len());
        for event in events {
            let id = inner.events.len() as i64 + 1;
            let mut row = event.clone();
            row.id = Some(id);
            inner.events.push(row);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn stream_events_after(
        &self,
        start_secs: i64,
        stream_id: i64,
    ) -> StoreResult<Vec<StreamEvent>> {
        let mut events: Vec<StreamEvent> = self
            .inner
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.stream_id == stream_id && e.start_secs >= start_secs)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start_secs);
        Ok(events)
    }

    async fn create_clip(&self, clip: &Clip) -> StoreResult<i64> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.clips.len() as i64 + 1;
        let mut row = clip.clone();
        row.id = Some(id);
        inner.clips.push(row);
        Ok(id)
    }
}
