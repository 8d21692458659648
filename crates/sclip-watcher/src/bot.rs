//! The clip bot: consumes the watch loop's results and publishes them.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use sclip_models::{Clip, CreatedClipResult};
use sclip_storage::StorageClient;
use sclip_store::EventStore;

use crate::error::WatcherResult;
use crate::watcher::WatchEvent;

/// Consumes [`WatchEvent`]s: uploads each cut file, records the clip row,
/// and returns once the session ends. Clips queued behind the terminal
/// `Done` are drained before returning.
pub struct ClipperBot {
    store: Arc<dyn EventStore>,
    /// When unset, clips stay local and their path is recorded as the URL.
    storage: Option<StorageClient>,
    stream_id: i64,
}

impl ClipperBot {
    pub fn new(store: Arc<dyn EventStore>, storage: Option<StorageClient>, stream_id: i64) -> Self {
        Self {
            store,
            storage,
            stream_id,
        }
    }

    /// Run until the watch session ends. Returns every clip handled, or
    /// the session's error.
    pub async fn start(
        &self,
        mut events: mpsc::Receiver<WatchEvent>,
    ) -> WatcherResult<Vec<CreatedClipResult>> {
        let mut handled = Vec::new();

        while let Some(event) = events.recv().await {
            match event {
                WatchEvent::Clip(clip) => {
                    self.publish_clip(&clip).await?;
                    handled.push(clip);
                }
                WatchEvent::Done => {
                    info!("Stream ended; {} clips published", handled.len());
                    // The channel closes right after; keep receiving so any
                    // queued clips drain first.
                }
                WatchEvent::Error(e) => return Err(e),
            }
        }

        Ok(handled)
    }

    /// Upload the cut file (when storage is configured) and persist the
    /// clip row.
    async fn publish_clip(&self, clip: &CreatedClipResult) -> WatcherResult<()> {
        let url = match &self.storage {
            Some(storage) => {
                let file_name = clip
                    .output_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "clip.mp4".to_string());
                let key = StorageClient::clip_key(self.stream_id, &file_name);
                storage.upload_clip(&clip.output_path, &key).await?
            }
            None => clip.output_path.display().to_string(),
        };

        let row = Clip {
            id: None,
            stream_id: self.stream_id,
            start_secs: clip.found_clip.start_secs as i64,
            end_secs: clip.found_clip.end_secs as i64,
            caption: clip.found_clip.caption.clone(),
            description: clip.found_clip.description.clone(),
            buffer_start_secs: clip.buffer_start_secs as i64,
            buffer_end_secs: clip.buffer_end_secs as i64,
            url: url.clone(),
        };
        self.store.create_clip(&row).await?;

        info!(
            "Created clip [{:.0}s-{:.0}s] \"{}\" -> {}",
            clip.found_clip.start_secs, clip.found_clip.end_secs, clip.found_clip.caption, url
        );
        Ok(())
    }
}
