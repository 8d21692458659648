//! Clip materialization: resolving an absolute-time range onto segment
//! files and cutting it out with stream-copy.
//!
//! Segments are produced with identical codecs, timebases and reset
//! timestamps, so a cross-boundary span can be merged with the concat
//! demuxer and stream-copy; nothing is ever re-encoded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use sclip_models::{BufferedClip, FoundClip};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::MediaProbe;

/// Capability to materialize a found clip from segment files.
#[async_trait]
pub trait SegmentCutter: Send + Sync {
    /// Cut `clip` (expanded by the buffer margins) out of `segments`,
    /// returning the path of the new file.
    async fn cut(
        &self,
        clip: &FoundClip,
        segments: &[PathBuf],
        buf_start_secs: f64,
        buf_end_secs: f64,
    ) -> MediaResult<PathBuf>;
}

/// FFmpeg-backed [`SegmentCutter`].
pub struct ClipCutter {
    probe: Arc<dyn MediaProbe>,
    /// Where finished cut files are written.
    out_dir: PathBuf,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl ClipCutter {
    pub fn new(probe: Arc<dyn MediaProbe>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            probe,
            out_dir: out_dir.into(),
            cancel_rx: None,
        }
    }

    /// Thread a cancellation signal into every encoder invocation.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    fn runner(&self) -> FfmpegRunner {
        match &self.cancel_rx {
            Some(rx) => FfmpegRunner::new().with_cancel(rx.clone()),
            None => FfmpegRunner::new(),
        }
    }
}

#[async_trait]
impl SegmentCutter for ClipCutter {
    async fn cut(
        &self,
        clip: &FoundClip,
        segments: &[PathBuf],
        buf_start_secs: f64,
        buf_end_secs: f64,
    ) -> MediaResult<PathBuf> {
        let mut durations = Vec::with_capacity(segments.len());
        for segment in segments {
            durations.push(self.probe.duration(segment).await?);
        }
        let total: f64 = durations.iter().sum();

        let buffered = BufferedClip::new(clip, buf_start_secs, buf_end_secs, total);
        let span = locate_span(&durations, buffered.start_secs, buffered.end_secs)?;

        debug!(
            "Cutting [{:.1}, {:.1}] across segments {}..={}",
            buffered.start_secs, buffered.end_secs, span.start_idx, span.end_idx
        );

        // Per-cut scratch space; removed on every exit path when dropped.
        let scratch = tempfile::tempdir()?;

        let input = if span.start_idx == span.end_idx {
            segments[span.start_idx].clone()
        } else {
            let boundary = &segments[span.start_idx..=span.end_idx];
            concat_segments(&self.runner(), boundary, scratch.path()).await?
        };

        tokio::fs::create_dir_all(&self.out_dir).await?;
        let output = self.out_dir.join(format!("clip-{}.mp4", Uuid::new_v4()));

        let cmd = FfmpegCommand::new(&input, &output)
            .seek(span.start_offset)
            .limit(buffered.duration_secs())
            .stream_copy();
        self.runner().run(&cmd).await?;

        info!(
            "Cut clip [{:.1}, {:.1}] -> {}",
            buffered.start_secs,
            buffered.end_secs,
            output.display()
        );
        Ok(output)
    }
}

/// Merge consecutive segments with the concat demuxer, stream-copy.
async fn concat_segments(
    runner: &FfmpegRunner,
    segments: &[PathBuf],
    scratch: &Path,
) -> MediaResult<PathBuf> {
    let manifest_path = scratch.join("concat.txt");
    let mut manifest = String::new();
    for segment in segments {
        let absolute = tokio::fs::canonicalize(segment).await?;
        manifest.push_str(&format!("file '{}'\n", absolute.display()));
    }
    tokio::fs::write(&manifest_path, manifest).await?;

    let merged = scratch.join("merged.mp4");
    let cmd = FfmpegCommand::new(&manifest_path, &merged)
        .concat_input()
        .stream_copy();
    runner.run(&cmd).await?;

    Ok(merged)
}

/// Where a `[start, end]` range falls within a list of segment durations.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SegmentSpan {
    /// Segment containing `start`.
    start_idx: usize,
    /// Offset of `start` within that segment.
    start_offset: f64,
    /// Segment containing `end` (inclusive bound).
    end_idx: usize,
}

/// Walk cumulative durations to find the segments covering `[start, end]`.
fn locate_span(durations: &[f64], start: f64, end: f64) -> MediaResult<SegmentSpan> {
    let total: f64 = durations.iter().sum();

    let mut cum = 0.0;
    let mut located_start = None;
    let mut located_end = None;

    for (idx, duration) in durations.iter().enumerate() {
        if located_start.is_none() && start < cum + duration {
            located_start = Some((idx, start - cum));
        }
        if end <= cum + duration {
            located_end = Some(idx);
            break;
        }
        cum += duration;
    }

    match (located_start, located_end) {
        (Some((start_idx, start_offset)), Some(end_idx)) => Ok(SegmentSpan {
            start_idx,
            start_offset,
            end_idx,
        }),
        _ => Err(MediaError::ClipOutOfRange {
            end_secs: end,
            total_secs: total,
        }),
    }
}
