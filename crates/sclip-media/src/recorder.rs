//! Stream capture and segmentation.
//!
//! [`StreamRecorder`] drives a `streamlink → ffmpeg` process pair: the
//! capture writes best-quality stream bytes to a pipe, the segmenter cuts
//! the pipe into fixed-length stream-copied `.mp4` files. A 1 Hz scanner
//! surfaces completed segment files in index order; the newest file is held
//! back until a lexicographically greater one appears, which establishes
//! that it is closed.
//!
//! [`FileRecorder`] replays an existing recording over the same event
//! stream by splitting it with the segment muxer first.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::command::{cancelled, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Segment file extension produced by the segmenter.
const SEGMENT_EXT: &str = "mp4";

/// How often the output directory is scanned for completed segments.
const SCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Capacity of the segment event channel. The recorder blocks on send when
/// the consumer is slow; segment files keep accumulating on disk meanwhile.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// One recorder notification, in emission order.
#[derive(Debug)]
pub enum RecorderEvent {
    /// A completed segment file, strictly in index order.
    Segment(PathBuf),
    /// Both child processes terminated normally; no further segments follow.
    Done,
    /// The capture failed; terminal.
    Error(MediaError),
}

/// Records a live stream into an ordered sequence of segment files.
#[derive(Debug, Clone, Default)]
pub struct StreamRecorder;

impl StreamRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Start capturing `stream_url` into `output_dir`, cutting every
    /// `segment_secs`. Returns the recorder's event stream; the channel
    /// closes when the recorder task exits.
    pub fn record(
        &self,
        stream_url: &str,
        output_dir: &Path,
        segment_secs: u32,
        cancel_rx: watch::Receiver<bool>,
    ) -> mpsc::Receiver<RecorderEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let stream_url = stream_url.to_string();
        let output_dir = output_dir.to_path_buf();

        tokio::spawn(async move {
            match capture(&stream_url, &output_dir, segment_secs, cancel_rx, &tx).await {
                Ok(CaptureOutcome::Completed) => {
                    let _ = tx.send(RecorderEvent::Done).await;
                }
                Ok(CaptureOutcome::Cancelled) => {
                    debug!("stream capture cancelled");
                }
                Err(e) => {
                    let _ = tx.send(RecorderEvent::Error(e)).await;
                }
            }
        });

        rx
    }
}

enum CaptureOutcome {
    Completed,
    Cancelled,
}

async fn capture(
    stream_url: &str,
    output_dir: &Path,
    segment_secs: u32,
    mut cancel_rx: watch::Receiver<bool>,
    tx: &mpsc::Sender<RecorderEvent>,
) -> MediaResult<CaptureOutcome> {
    tokio::fs::create_dir_all(output_dir).await?;

    which::which("streamlink").map_err(|_| MediaError::StreamlinkNotFound)?;
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

    info!(
        "Recording {} into {} ({}s segments)",
        stream_url,
        output_dir.display(),
        segment_secs
    );

    let mut capture = Command::new("streamlink")
        .args(["--stdout", stream_url, "best"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    // The capture's stdout is piped straight into the segmenter's stdin;
    // neither process ever sees a filename.
    let capture_stdout = capture
        .stdout
        .take()
        .ok_or_else(|| MediaError::capture_failed("streamlink stdout not captured", None))?;
    let segmenter_stdin: Stdio = capture_stdout.try_into()?;

    let pattern = output_dir.join(format!("output%03d.{SEGMENT_EXT}"));
    let segment_args = FfmpegCommand::new("pipe:0", &pattern)
        .stream_copy()
        .segmented(segment_secs)
        .build_args();

    let mut segmenter = Command::new("ffmpeg")
        .args(&segment_args)
        .stdin(segmenter_stdin)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    let mut scanner = SegmentScanner::new(output_dir.to_path_buf());
    let mut ticker = tokio::time::interval(SCAN_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // The segmenter exits once the pipe closes, so its termination implies
    // the capture is finishing too.
    let segmenter_status = loop {
        tokio::select! {
            _ = cancelled(&mut cancel_rx) => {
                kill_pair(&mut capture, &mut segmenter).await;
                return Ok(CaptureOutcome::Cancelled);
            }
            status = segmenter.wait() => break status?,
            _ = ticker.tick() => {
                for path in scanner.poll().await? {
                    if tx.send(RecorderEvent::Segment(path)).await.is_err() {
                        // Consumer gone; stop recording.
                        kill_pair(&mut capture, &mut segmenter).await;
                        return Ok(CaptureOutcome::Cancelled);
                    }
                }
            }
        }
    };

    if !segmenter_status.success() {
        // The capture may be blocked writing into a dead pipe.
        if let Err(e) = capture.kill().await {
            warn!("failed to kill capture process: {}", e);
        }
        return Err(MediaError::ffmpeg_failed(
            "segmenter exited with error",
            None,
            segmenter_status.code(),
        ));
    }

    let capture_status = capture.wait().await?;
    if !capture_status.success() {
        return Err(MediaError::capture_failed(
            "streamlink exited with error",
            capture_status.code(),
        ));
    }

    // The segmenter has closed its last file; release everything still
    // unemitted, including the held-back newest.
    for path in scanner.final_sweep().await? {
        if tx.send(RecorderEvent::Segment(path)).await.is_err() {
            return Ok(CaptureOutcome::Cancelled);
        }
    }

    info!("Stream capture finished");
    Ok(CaptureOutcome::Completed)
}

async fn kill_pair(capture: &mut Child, segmenter: &mut Child) {
    if let Err(e) = capture.kill().await {
        warn!("failed to kill capture process: {}", e);
    }
    if let Err(e) = segmenter.kill().await {
        warn!("failed to kill segmenter process: {}", e);
    }
}

/// Tracks which segment files have been emitted and holds back the newest.
struct SegmentScanner {
    dir: PathBuf,
    emitted: BTreeSet<PathBuf>,
}

impl SegmentScanner {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            emitted: BTreeSet::new(),
        }
    }

    /// Sorted segment files currently in the directory.
    async fn list(&self) -> MediaResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(SEGMENT_EXT) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Completed (non-newest) files not yet emitted, in order.
    async fn poll(&mut self) -> MediaResult<Vec<PathBuf>> {
        let files = self.list().await?;
        let Some(newest) = files.last().cloned() else {
            return Ok(Vec::new());
        };

        let mut ready = Vec::new();
        for file in files {
            if file != newest && self.emitted.insert(file.clone()) {
                ready.push(file);
            }
        }
        Ok(ready)
    }

    /// Every remaining file, newest included. Only valid once the
    /// segmenter has exited.
    async fn final_sweep(&mut self) -> MediaResult<Vec<PathBuf>> {
        let files = self.list().await?;
        let mut ready = Vec::new();
        for file in files {
            if self.emitted.insert(file.clone()) {
                ready.push(file);
            }
        }
        Ok(ready)
    }
}

/// Split `input` into fixed-length stream-copied segments under
/// `output_dir`, returning the produced paths in order.
pub async fn segment_file(
    input: &Path,
    output_dir: &Path,
    segment_secs: u32,
) -> MediaResult<Vec<PathBuf>> {
    tokio::fs::create_dir_all(output_dir).await?;

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("segment");
    let pattern = output_dir.join(format!("{stem}_%03d.{SEGMENT_EXT}"));

    let cmd = FfmpegCommand::new(input, &pattern)
        .stream_copy()
        .segmented(segment_secs);
    FfmpegRunner::new().run(&cmd).await?;

    let mut produced = Vec::new();
    for index in 0.. {
        let path = output_dir.join(format!("{stem}_{index:03}.{SEGMENT_EXT}"));
        if !path.exists() {
            break;
        }
        produced.push(path);
    }
    Ok(produced)
}

/// Replays an already-recorded file as a segment stream.
///
/// Splits the input with the same segment muxer configuration as the live
/// recorder, then emits every produced path followed by `Done`.
#[derive(Debug, Clone, Default)]
pub struct FileRecorder;

impl FileRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Split `input` into `output_dir` and stream the resulting segments.
    pub fn record(
        &self,
        input: &Path,
        output_dir: &Path,
        segment_secs: u32,
    ) -> mpsc::Receiver<RecorderEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let input = input.to_path_buf();
        let output_dir = output_dir.to_path_buf();

        tokio::spawn(async move {
            match segment_file(&input, &output_dir, segment_secs).await {
                Ok(segments) => {
                    for segment in segments {
                        if tx.send(RecorderEvent::Segment(segment)).await.is_err() {
                            return;
                        }
                    }
                    let _ = tx.send(RecorderEvent::Done).await;
                }
                Err(e) => {
                    let _ = tx.send(RecorderEvent::Error(e)).await;
                }
            }
        });

        rx
    }
}
