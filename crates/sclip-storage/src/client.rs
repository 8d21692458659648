//! S3 clip storage client.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Configuration for the clip bucket.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Bucket name
    pub bucket: String,
    /// Public domain serving the bucket (e.g. a CDN distribution); used to
    /// build the returned URL.
    pub public_domain: String,
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            bucket: std::env::var("CLIPS_BUCKET")
                .map_err(|_| StorageError::config_error("CLIPS_BUCKET not set"))?,
            public_domain: std::env::var("CLIPS_PUBLIC_DOMAIN")
                .map_err(|_| StorageError::config_error("CLIPS_PUBLIC_DOMAIN not set"))?,
        })
    }
}

/// S3-compatible storage client for finished clips.
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    config: StorageConfig,
}

impl StorageClient {
    /// Create a new storage client with the default AWS credential chain.
    pub async fn new(config: StorageConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self {
            client: Client::new(&sdk_config),
            config,
        }
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        Ok(Self::new(StorageConfig::from_env()?).await)
    }

    /// Object key for a clip of a stream.
    pub fn clip_key(stream_id: i64, file_name: &str) -> String {
        format!("clips/{stream_id}/{file_name}")
    }

    /// Public URL for an object key.
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "https://{}/{}",
            self.config.public_domain.trim_end_matches('/'),
            key
        )
    }

    /// Upload a clip file, returning its public URL.
    pub async fn upload_clip(&self, path: impl AsRef<Path>, key: &str) -> StorageResult<String> {
        let path = path.as_ref();
        debug!("Uploading {} to s3://{}/{}", path.display(), self.config.bucket, key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(body)
            .content_type("video/mp4")
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let url = self.public_url(key);
        info!("Uploaded {} to {}", path.display(), url);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_key_layout() {
        assert_eq!(
            StorageClient::clip_key(3, "clip-abc.mp4"),
            "clips/3/clip-abc.mp4"
        );
    }
}
