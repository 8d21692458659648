//! Stream watching orchestration.
//!
//! This crate wires the pipeline together:
//! - [`StreamWatcher`] consumes the recorder's segment stream, drives the
//!   summarizer/store/probe per segment, and searches for clips after each
//!   processed segment
//! - [`ClipFinder`] composes the reasoning prompt over accumulated events
//! - [`GeminiClient`] implements both model-facing capabilities
//! - [`ClipperBot`] publishes each materialized clip

pub mod bot;
pub mod config;
pub mod error;
pub mod finder;
pub mod gemini;
pub mod summarizer;
pub mod watcher;

pub use bot::ClipperBot;
pub use config::WatcherConfig;
pub use error::{WatcherError, WatcherResult};
pub use finder::ClipFinder;
pub use gemini::GeminiClient;
pub use summarizer::{ClipReasoner, Summarizer};
pub use watcher::{StreamWatcher, WatchEvent};
