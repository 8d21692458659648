//! Clip discovery over accumulated stream events.

use std::sync::Arc;

use tracing::{debug, warn};

use sclip_models::{FoundClip, StreamEvent};
use sclip_store::EventStore;

use crate::error::WatcherResult;
use crate::summarizer::ClipReasoner;

/// Asks the reasoner for viral-worthy clip ranges among the events that
/// came after the current search window start.
pub struct ClipFinder {
    reasoner: Arc<dyn ClipReasoner>,
    store: Arc<dyn EventStore>,
    stream_id: i64,
}

impl ClipFinder {
    pub fn new(reasoner: Arc<dyn ClipReasoner>, store: Arc<dyn EventStore>, stream_id: i64) -> Self {
        Self {
            reasoner,
            store,
            stream_id,
        }
    }

    /// Zero or more absolute-time clip ranges among events with
    /// `start_secs >= window_start`.
    pub async fn find_clips(
        &self,
        window_start: i64,
        context: &str,
        streamer_name: &str,
    ) -> WatcherResult<Vec<FoundClip>> {
        let events = self
            .store
            .stream_events_after(window_start, self.stream_id)
            .await?;

        if events.is_empty() {
            debug!("No events after {}s; skipping clip search", window_start);
            return Ok(Vec::new());
        }

        let prompt = finder_prompt(&events, context, streamer_name);
        let clips = self.reasoner.propose_clips(&prompt).await?;

        Ok(clips
            .into_iter()
            .filter(|clip| {
                if clip.end_secs > clip.start_secs {
                    true
                } else {
                    warn!(
                        "Dropping degenerate clip [{}, {}]",
                        clip.start_secs, clip.end_secs
                    );
                    false
                }
            })
            .collect())
    }
}

/// The clip-selection prompt: event rows as CSV-like text, the current
/// narrative, and the selection rules.
fn finder_prompt(events: &[StreamEvent], context: &str, streamer_name: &str) -> String {
    let mut rows = String::new();
    for event in events {
        rows.push_str(&format!(
            "{},{},{}\n",
            event.start_secs, event.end_secs, event.description
        ));
    }

    format!(
        r#"You are picking moments from a live stream by {streamer_name} to turn into viral clips.

Here are the stream events so far, one per line as start_secs,end_secs,description (times are absolute seconds from the start of the stream):

{rows}
Here is the current context of the stream: {context}

Select the moments (if any) that would make great stand-alone viral clips, and return them in found_clips. Rules:
- Each clip must be between 10 and 180 seconds long.
- If two moments cover the same topic and the gap between them is 60 seconds or less, merge them into one clip spanning from the start of the first to the end of the second.
- Be very selective: it is much better to return no clips than a mediocre one.
- The caption must be short and clickbaity, reference {streamer_name} by name, and contain no hashtags.
- start_secs and end_secs must be absolute seconds within the stream, taken from the events above.

If nothing stands out, return an empty found_clips list."#
    )
}
