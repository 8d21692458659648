//! FFmpeg and streamlink integration for the StreamClip pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with cancellation support
//! - Live stream capture via a `streamlink → ffmpeg` segmenter pair
//! - File-based segment replay for VOD runs
//! - Exact duration probing via ffprobe
//! - Cross-segment clip cutting with concat + stream-copy

pub mod command;
pub mod cutter;
pub mod error;
pub mod probe;
pub mod recorder;

pub use command::{cancelled, FfmpegCommand, FfmpegRunner};
pub use cutter::{ClipCutter, SegmentCutter};
pub use error::{MediaError, MediaResult};
pub use probe::{FfprobeClient, MediaProbe};
pub use recorder::{segment_file, FileRecorder, RecorderEvent, StreamRecorder};
