//! Watch-loop scenarios against fake collaborators.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use sclip_media::{MediaError, MediaProbe, MediaResult, RecorderEvent, SegmentCutter};
use sclip_models::{CreatedClipResult, FoundClip, SegmentSummaryResponse, SummaryEvent};
use sclip_store::InMemoryStore;
use sclip_watcher::{
    ClipFinder, ClipReasoner, ClipperBot, StreamWatcher, Summarizer, WatchEvent, WatcherError,
    WatcherResult,
};

const STREAM_ID: i64 = 3;
const SEGMENT_SECS: f64 = 120.0;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Returns one scripted (or default) event list per call and records the
/// rolling context it was handed.
#[derive(Default)]
struct FakeSummarizer {
    scripted: Mutex<VecDeque<Vec<SummaryEvent>>>,
    seen_contexts: Mutex<Vec<(String, String)>>,
    calls: AtomicUsize,
}

impl FakeSummarizer {
    fn script(&self, events: Vec<Vec<SummaryEvent>>) {
        *self.scripted.lock().unwrap() = events.into();
    }
}

fn summary_event(start: &str, end: &str, description: &str) -> SummaryEvent {
    SummaryEvent {
        start_time: start.to_string(),
        end_time: end.to_string(),
        description: description.to_string(),
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize_segment(
        &self,
        _segment: &Path,
        context: &str,
        last_tail: &str,
        _streamer_name: &str,
    ) -> WatcherResult<SegmentSummaryResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_contexts
            .lock()
            .unwrap()
            .push((context.to_string(), last_tail.to_string()));

        let events = self
            .scripted
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![summary_event("0:10", "0:20", &format!("event-{n}"))]);

        Ok(SegmentSummaryResponse {
            stream_events: events,
            updated_context: format!("ctx-{n}"),
            last_20_secs: format!("tail-{n}"),
        })
    }
}

struct FakeProbe {
    duration: f64,
}

#[async_trait]
impl MediaProbe for FakeProbe {
    async fn duration(&self, _path: &Path) -> MediaResult<f64> {
        Ok(self.duration)
    }
}

#[derive(Default)]
struct FakeReasoner {
    scripted: Mutex<VecDeque<Vec<FoundClip>>>,
    calls: AtomicUsize,
}

impl FakeReasoner {
    fn script(&self, answers: Vec<Vec<FoundClip>>) {
        *self.scripted.lock().unwrap() = answers.into();
    }
}

#[async_trait]
impl ClipReasoner for FakeReasoner {
    async fn propose_clips(&self, _prompt: &str) -> WatcherResult<Vec<FoundClip>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.scripted.lock().unwrap().pop_front().unwrap_or_default())
    }
}

#[derive(Default)]
struct FakeCutter {
    calls: Mutex<Vec<(FoundClip, usize, f64, f64)>>,
}

#[async_trait]
impl SegmentCutter for FakeCutter {
    async fn cut(
        &self,
        clip: &FoundClip,
        segments: &[PathBuf],
        buf_start_secs: f64,
        buf_end_secs: f64,
    ) -> MediaResult<PathBuf> {
        let mut calls = self.calls.lock().unwrap();
        calls.push((clip.clone(), segments.len(), buf_start_secs, buf_end_secs));
        Ok(PathBuf::from(format!("/tmp/clips/cut-{}.mp4", calls.len())))
    }
}

fn found_clip(start: f64, end: f64) -> FoundClip {
    FoundClip {
        start_secs: start,
        end_secs: end,
        caption: "He actually did it".to_string(),
        description: "A big moment".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    summarizer: Arc<FakeSummarizer>,
    probe: Arc<FakeProbe>,
    reasoner: Arc<FakeReasoner>,
    cutter: Arc<FakeCutter>,
    store: Arc<InMemoryStore>,
    buf_start_secs: f64,
    buf_end_secs: f64,
}

impl Harness {
    fn new() -> Self {
        Self {
            summarizer: Arc::new(FakeSummarizer::default()),
            probe: Arc::new(FakeProbe {
                duration: SEGMENT_SECS,
            }),
            reasoner: Arc::new(FakeReasoner::default()),
            cutter: Arc::new(FakeCutter::default()),
            store: Arc::new(InMemoryStore::new()),
            buf_start_secs: 0.0,
            buf_end_secs: 0.0,
        }
    }

    fn watcher(&self) -> StreamWatcher {
        let finder = ClipFinder::new(self.reasoner.clone(), self.store.clone(), STREAM_ID);
        StreamWatcher::new(
            self.summarizer.clone(),
            self.probe.clone(),
            self.cutter.clone(),
            self.store.clone(),
            finder,
            STREAM_ID,
            "ginge",
            self.buf_start_secs,
            self.buf_end_secs,
        )
    }
}

fn segment(n: usize) -> RecorderEvent {
    RecorderEvent::Segment(PathBuf::from(format!("output{n:03}.mp4")))
}

/// Feed a scripted recorder stream and collect every watch event.
async fn run_session(harness: &Harness, feed: Vec<RecorderEvent>) -> Vec<WatchEvent> {
    let (tx, rx) = mpsc::channel(16);
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let results = harness.watcher().watch(rx, cancel_rx);

    for event in feed {
        tx.send(event).await.unwrap();
    }
    drop(tx);

    collect(results).await
}

async fn collect(mut rx: mpsc::Receiver<WatchEvent>) -> Vec<WatchEvent> {
    tokio::time::timeout(Duration::from_secs(5), async {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    })
    .await
    .expect("watch session did not terminate")
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// Three segments; a clip is found after the second one. Checks the
/// monotone cursor, the absolute-time law, the pending-one rule and the
/// done/drain rule in one pass.
#[tokio::test]
async fn session_processes_all_segments_and_emits_found_clip() {
    let harness = Harness::new();
    harness
        .reasoner
        .script(vec![vec![], vec![found_clip(130.0, 140.0)], vec![]]);

    let events = run_session(
        &harness,
        vec![segment(0), segment(1), segment(2), RecorderEvent::Done],
    )
    .await;

    // One clip, then the terminal Done.
    assert_eq!(events.len(), 2);
    let WatchEvent::Clip(clip) = &events[0] else {
        panic!("expected a clip first, got {:?}", events[0]);
    };
    assert!(matches!(events[1], WatchEvent::Done));
    assert_eq!(clip.found_clip, found_clip(130.0, 140.0));
    assert_eq!(clip.output_path, PathBuf::from("/tmp/clips/cut-1.mp4"));

    // All three segments were summarized, in order, with the context chain
    // threaded through.
    let seen = harness.summarizer.seen_contexts.lock().unwrap().clone();
    assert_eq!(seen.len(), 3);
    assert!(seen[0].0.starts_with("[This is the first segment"));
    assert_eq!(seen[1], ("ctx-0".to_string(), "tail-0".to_string()));
    assert_eq!(seen[2], ("ctx-1".to_string(), "tail-1".to_string()));

    // Events carry absolute times: relative 10s offset by 0, 120, 240.
    let stored = harness.store.events();
    let starts: Vec<i64> = stored.iter().map(|e| e.start_secs).collect();
    let ends: Vec<i64> = stored.iter().map(|e| e.end_secs).collect();
    assert_eq!(starts, vec![10, 130, 250]);
    assert_eq!(ends, vec![20, 140, 260]);

    // One context row per segment, each event tagged with its row.
    let contexts = harness.store.contexts();
    assert_eq!(contexts.len(), 3);
    assert_eq!(contexts[2].context, "ctx-2");
    assert_eq!(contexts[2].last_tail, "tail-2");
    let context_ids: Vec<i64> = stored.iter().map(|e| e.stream_context_id).collect();
    assert_eq!(context_ids, vec![1, 2, 3]);

    // The cut saw every segment recorded up to that point.
    let cuts = harness.cutter.calls.lock().unwrap().clone();
    assert_eq!(cuts.len(), 1);
    assert_eq!(cuts[0].1, 3);
}

/// The cutter receives the configured buffer margins.
#[tokio::test]
async fn buffers_are_passed_through_to_the_cutter() {
    let mut harness = Harness::new();
    harness.buf_start_secs = 20.0;
    harness.buf_end_secs = 20.0;
    harness
        .reasoner
        .script(vec![vec![found_clip(130.0, 140.0)]]);

    let events = run_session(
        &harness,
        vec![segment(0), segment(1), RecorderEvent::Done],
    )
    .await;

    let WatchEvent::Clip(clip) = &events[0] else {
        panic!("expected a clip");
    };
    assert_eq!(clip.buffer_start_secs, 20.0);
    assert_eq!(clip.buffer_end_secs, 20.0);

    let cuts = harness.cutter.calls.lock().unwrap().clone();
    assert_eq!(cuts[0].2, 20.0);
    assert_eq!(cuts[0].3, 20.0);
}

/// An empty reasoner answer is a normal outcome: no results, no errors.
#[tokio::test]
async fn empty_clip_searches_emit_nothing() {
    let harness = Harness::new();

    let events = run_session(
        &harness,
        vec![segment(0), segment(1), segment(2), RecorderEvent::Done],
    )
    .await;

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], WatchEvent::Done));
    assert!(harness.cutter.calls.lock().unwrap().is_empty());
    // Every processed segment still triggered a search.
    assert_eq!(harness.reasoner.calls.load(Ordering::SeqCst), 3);
}

/// Two same-topic moments merged by the reasoner advance the window past
/// their end, so the next search sees no events and skips the reasoner.
#[tokio::test]
async fn window_start_ratchets_past_found_clips() {
    let harness = Harness::new();
    harness.summarizer.script(vec![
        vec![
            summary_event("1:40", "1:50", "the play starts"),
            summary_event("2:00", "2:30", "and pays off"),
        ],
        vec![],
    ]);
    harness.reasoner.script(vec![vec![found_clip(100.0, 150.0)]]);

    let events = run_session(
        &harness,
        vec![segment(0), segment(1), RecorderEvent::Done],
    )
    .await;

    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], WatchEvent::Clip(_)));
    assert!(matches!(events[1], WatchEvent::Done));

    // Second find: events at 100 and 120 are both behind window_start=150,
    // so the store query comes back empty and the reasoner is not asked.
    assert_eq!(harness.reasoner.calls.load(Ordering::SeqCst), 1);
}

/// A malformed mm:ss from the summarizer fails the session before any row
/// of that segment is persisted.
#[tokio::test]
async fn malformed_timestamp_fails_the_session() {
    let harness = Harness::new();
    harness
        .summarizer
        .script(vec![vec![summary_event("1:2x", "1:30", "broken")]]);

    let events = run_session(
        &harness,
        vec![segment(0), segment(1), RecorderEvent::Done],
    )
    .await;

    assert_eq!(events.len(), 1);
    let WatchEvent::Error(err) = &events[0] else {
        panic!("expected an error, got {:?}", events[0]);
    };
    assert!(matches!(err, WatcherError::Timecode(_)));

    assert!(harness.store.events().is_empty());
    assert!(harness.store.contexts().is_empty());
}

/// A recorder error is surfaced and terminal.
#[tokio::test]
async fn recorder_errors_propagate() {
    let harness = Harness::new();

    let events = run_session(
        &harness,
        vec![
            segment(0),
            RecorderEvent::Error(MediaError::FfmpegNotFound),
        ],
    )
    .await;

    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        WatchEvent::Error(WatcherError::Media(MediaError::FfmpegNotFound))
    ));
}

/// A single pending segment is still processed exactly once when the
/// stream closes.
#[tokio::test]
async fn pending_segment_is_processed_on_close() {
    let harness = Harness::new();

    let events = run_session(&harness, vec![segment(0), RecorderEvent::Done]).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], WatchEvent::Done));
    assert_eq!(harness.store.contexts().len(), 1);
    assert_eq!(harness.summarizer.calls.load(Ordering::SeqCst), 1);
}

/// Cancellation ends the session cleanly: no terminal Done or Error, and
/// no further segments are processed.
#[tokio::test]
async fn cancellation_stops_the_session_cleanly() {
    let harness = Harness::new();

    let (tx, rx) = mpsc::channel(16);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut results = harness.watcher().watch(rx, cancel_rx);

    tx.send(segment(0)).await.unwrap();
    tx.send(segment(1)).await.unwrap();

    // Wait for the first segment to finish processing.
    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.store.contexts().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first segment never processed");

    cancel_tx.send(true).unwrap();

    // The result channel closes without a terminal event even though the
    // segment sender is still alive.
    let outcome = tokio::time::timeout(Duration::from_secs(5), results.recv())
        .await
        .expect("session did not stop after cancellation");
    assert!(outcome.is_none());

    assert_eq!(harness.store.contexts().len(), 1);
    drop(tx);
}

// ---------------------------------------------------------------------------
// ClipperBot
// ---------------------------------------------------------------------------

fn created(start: f64, end: f64, path: &str) -> CreatedClipResult {
    CreatedClipResult {
        output_path: PathBuf::from(path),
        found_clip: found_clip(start, end),
        buffer_start_secs: 0.0,
        buffer_end_secs: 20.0,
    }
}

#[tokio::test]
async fn bot_persists_each_clip_and_drains_on_done() {
    let store = Arc::new(InMemoryStore::new());
    let bot = ClipperBot::new(store.clone(), None, STREAM_ID);

    let (tx, rx) = mpsc::channel(16);
    tx.send(WatchEvent::Clip(created(130.0, 140.0, "/tmp/a.mp4")))
        .await
        .unwrap();
    tx.send(WatchEvent::Done).await.unwrap();
    tx.send(WatchEvent::Clip(created(200.0, 230.0, "/tmp/b.mp4")))
        .await
        .unwrap();
    drop(tx);

    let handled = bot.start(rx).await.unwrap();
    assert_eq!(handled.len(), 2);

    let rows = store.clips();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].start_secs, 130);
    assert_eq!(rows[0].end_secs, 140);
    assert_eq!(rows[0].buffer_end_secs, 20);
    // No storage configured: the local path stands in for the URL.
    assert_eq!(rows[0].url, "/tmp/a.mp4");
    assert_eq!(rows[1].url, "/tmp/b.mp4");
}

#[tokio::test]
async fn bot_returns_session_errors() {
    let store = Arc::new(InMemoryStore::new());
    let bot = ClipperBot::new(store, None, STREAM_ID);

    let (tx, rx) = mpsc::channel(16);
    tx.send(WatchEvent::Error(WatcherError::ai_failed("model quota")))
        .await
        .unwrap();
    drop(tx);

    let err = bot.start(rx).await.unwrap_err();
    assert!(matches!(err, WatcherError::AiFailed(_)));
}
