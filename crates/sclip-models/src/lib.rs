//! Shared data models for the StreamClip pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Stream events, contexts and persisted clips
//! - Found/buffered clip ranges
//! - Summarizer and clip-finder wire schemas (JSON Schema via schemars)
//! - The mm:ss / HH:MM:SS time codec

pub mod clip;
pub mod event;
pub mod summary;
pub mod timecode;

pub use clip::{BufferedClip, Clip, CreatedClipResult, FoundClip};
pub use event::{StreamContext, StreamEvent, Streamer};
pub use summary::{FoundClipEntry, FoundClipsResponse, SegmentSummaryResponse, SummaryEvent};
pub use timecode::{format_hhmmss, parse_mmss, TimecodeError};
