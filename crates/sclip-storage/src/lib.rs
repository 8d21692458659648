//! S3-compatible object storage for finished clips.

pub mod client;
pub mod error;

pub use client::{StorageClient, StorageConfig};
pub use error::{StorageError, StorageResult};
