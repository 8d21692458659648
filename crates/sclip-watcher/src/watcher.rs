//! The stream-watching loop.
//!
//! Consumes the recorder's segment stream and drives, per segment:
//! summarize → persist context + events → advance the position cursor,
//! then a clip search over everything after the current window start, and
//! a cut for each found clip. Segments are processed strictly in arrival
//! order; one segment is always held pending so the summarizer never runs
//! on a segment whose trailing context is still forming.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use sclip_media::{cancelled, MediaProbe, RecorderEvent, SegmentCutter};
use sclip_models::{parse_mmss, CreatedClipResult, StreamContext, StreamEvent};
use sclip_store::EventStore;

use crate::error::{WatcherError, WatcherResult};
use crate::finder::ClipFinder;
use crate::summarizer::Summarizer;

/// Rolling-context sentinel for the first segment.
const FIRST_SEGMENT_CONTEXT: &str =
    "[This is the first segment of the stream, so no context is available.]";
const FIRST_SEGMENT_TAIL: &str =
    "[This is the first segment of the stream, so no last 20 seconds context is available.]";

/// Capacity of the result event channel.
const RESULT_CHANNEL_CAPACITY: usize = 16;

/// One watch-session notification, in emission order.
#[derive(Debug)]
pub enum WatchEvent {
    /// A clip was materialized.
    Clip(CreatedClipResult),
    /// The stream ended and every segment was processed; terminal.
    Done,
    /// The session failed; terminal.
    Error(WatcherError),
}

/// The stream-watching orchestrator.
pub struct StreamWatcher {
    summarizer: Arc<dyn Summarizer>,
    probe: Arc<dyn MediaProbe>,
    cutter: Arc<dyn SegmentCutter>,
    store: Arc<dyn EventStore>,
    finder: ClipFinder,
    stream_id: i64,
    streamer_name: String,
    buf_start_secs: f64,
    buf_end_secs: f64,
}

/// All mutable session state; owned by the loop task alone.
struct WatchState {
    /// Absolute stream seconds consumed by processed segments.
    position_secs: f64,
    context: String,
    last_tail: String,
    /// Every segment seen so far, in index order.
    segments: Vec<PathBuf>,
    /// The one segment delayed until its successor arrives.
    pending: Option<PathBuf>,
    /// Lower bound (absolute seconds) for the next clip search.
    window_start: i64,
    done_received: bool,
    created: Vec<CreatedClipResult>,
}

impl WatchState {
    fn new() -> Self {
        Self {
            position_secs: 0.0,
            context: FIRST_SEGMENT_CONTEXT.to_string(),
            last_tail: FIRST_SEGMENT_TAIL.to_string(),
            segments: Vec::new(),
            pending: None,
            window_start: 0,
            done_received: false,
            created: Vec::new(),
        }
    }
}

impl StreamWatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        summarizer: Arc<dyn Summarizer>,
        probe: Arc<dyn MediaProbe>,
        cutter: Arc<dyn SegmentCutter>,
        store: Arc<dyn EventStore>,
        finder: ClipFinder,
        stream_id: i64,
        streamer_name: impl Into<String>,
        buf_start_secs: f64,
        buf_end_secs: f64,
    ) -> Self {
        Self {
            summarizer,
            probe,
            cutter,
            store,
            finder,
            stream_id,
            streamer_name: streamer_name.into(),
            buf_start_secs,
            buf_end_secs,
        }
    }

    /// Consume the recorder's event stream. The returned channel carries
    /// one [`WatchEvent::Clip`] per materialized clip, then a terminal
    /// `Done` or `Error`, and closes when the session ends. Cancellation
    /// stops the session cleanly without a terminal event.
    pub fn watch(
        self,
        segments: mpsc::Receiver<RecorderEvent>,
        cancel_rx: watch::Receiver<bool>,
    ) -> mpsc::Receiver<WatchEvent> {
        let (tx, rx) = mpsc::channel(RESULT_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            match self.run(segments, cancel_rx, &tx).await {
                Ok(Outcome::Completed) => {
                    let _ = tx.send(WatchEvent::Done).await;
                }
                Ok(Outcome::Stopped) => {
                    info!("Watch session stopped");
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(e)).await;
                }
            }
        });

        rx
    }

    async fn run(
        &self,
        mut segments: mpsc::Receiver<RecorderEvent>,
        mut cancel_rx: watch::Receiver<bool>,
        tx: &mpsc::Sender<WatchEvent>,
    ) -> WatcherResult<Outcome> {
        let mut state = WatchState::new();

        loop {
            tokio::select! {
                // Never start another process step once cancellation is
                // observed.
                biased;

                _ = cancelled(&mut cancel_rx) => {
                    info!(
                        "Cancelled after {} segments, {} clips",
                        state.segments.len() - usize::from(state.pending.is_some()),
                        state.created.len()
                    );
                    return Ok(Outcome::Stopped);
                }

                event = segments.recv() => match event {
                    None => {
                        if let Some(pending) = state.pending.take() {
                            self.process_segment(&mut state, &pending).await?;
                            self.find_and_cut(&mut state, tx).await?;
                        }
                        if !state.done_received {
                            warn!("Segment stream closed without a done signal");
                        }
                        info!(
                            "Watch session finished: {} segments, {} clips",
                            state.segments.len(),
                            state.created.len()
                        );
                        return Ok(Outcome::Completed);
                    }
                    Some(RecorderEvent::Error(e)) => return Err(e.into()),
                    Some(RecorderEvent::Done) => {
                        // Keep draining: already-emitted segments may still
                        // be queued behind this signal.
                        state.done_received = true;
                    }
                    Some(RecorderEvent::Segment(segment)) => {
                        state.segments.push(segment.clone());

                        match state.pending.take() {
                            None => state.pending = Some(segment),
                            Some(pending) => {
                                self.process_segment(&mut state, &pending).await?;
                                self.find_and_cut(&mut state, tx).await?;
                                state.pending = Some(segment);
                            }
                        }
                    }
                },
            }
        }
    }

    /// Summarize one segment, persist its context and events, and advance
    /// the position cursor by its measured duration.
    async fn process_segment(&self, state: &mut WatchState, segment: &Path) -> WatcherResult<()> {
        info!(
            "Processing segment {} at position {:.1}s",
            segment.display(),
            state.position_secs
        );

        let summary = self
            .summarizer
            .summarize_segment(segment, &state.context, &state.last_tail, &self.streamer_name)
            .await?;

        // Convert every event up front so a malformed timestamp fails the
        // step before anything is persisted.
        let position = state.position_secs as i64;
        let mut converted = Vec::with_capacity(summary.stream_events.len());
        for event in &summary.stream_events {
            let start_secs = parse_mmss(&event.start_time)? as i64 + position;
            let end_secs = parse_mmss(&event.end_time)? as i64 + position;
            converted.push((start_secs, end_secs, event.description.clone()));
        }

        let context_row = StreamContext::new(
            self.stream_id,
            summary.updated_context.clone(),
            summary.last_20_secs.clone(),
        );
        let context_id = self.store.create_stream_context(&context_row).await?;

        let events: Vec<StreamEvent> = converted
            .into_iter()
            .map(|(start_secs, end_secs, description)| StreamEvent {
                id: None,
                start_secs,
                end_secs,
                description,
                stream_id: self.stream_id,
                stream_context_id: context_id,
            })
            .collect();
        self.store.create_stream_events(&events).await?;

        let duration = self.probe.duration(segment).await?;
        state.position_secs += duration;
        state.context = summary.updated_context;
        state.last_tail = summary.last_20_secs;

        Ok(())
    }

    /// Search for clips after the window start and materialize each one.
    async fn find_and_cut(
        &self,
        state: &mut WatchState,
        tx: &mpsc::Sender<WatchEvent>,
    ) -> WatcherResult<()> {
        let clips = self
            .finder
            .find_clips(state.window_start, &state.context, &self.streamer_name)
            .await?;

        if clips.is_empty() {
            return Ok(());
        }

        for clip in &clips {
            let output = self
                .cutter
                .cut(clip, &state.segments, self.buf_start_secs, self.buf_end_secs)
                .await?;

            let result = CreatedClipResult {
                output_path: output,
                found_clip: clip.clone(),
                buffer_start_secs: self.buf_start_secs,
                buffer_end_secs: self.buf_end_secs,
            };
            state.created.push(result.clone());

            if tx.send(WatchEvent::Clip(result)).await.is_err() {
                // Consumer gone; nothing left to emit to.
                return Ok(());
            }
        }

        // Ratchet the window so the reasoner cannot re-propose these
        // moments in a later pass.
        let latest_end = clips
            .iter()
            .map(|c| c.end_secs.floor() as i64)
            .max()
            .unwrap_or(state.window_start);
        state.window_start = state.window_start.max(latest_end);

        Ok(())
    }
}

enum Outcome {
    Completed,
    Stopped,
}
