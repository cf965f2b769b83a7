//! External object store — the preferred home for uploaded resumes.
//!
//! Handlers and services only see `Arc<dyn ObjectStore>`; `S3ObjectStore`
//! is the production backend (MinIO locally, S3 in production).

use std::time::Duration;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::S3Config;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("external object store is not configured")]
    NotConfigured,

    #[error("external object store timed out after {0}s")]
    Timeout(u64),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("delete failed: {0}")]
    Delete(String),
}

/// Pointer returned by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
    pub object_id: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, ObjectStoreError>;

    async fn delete(&self, object_id: &str) -> Result<(), ObjectStoreError>;
}

/// Deletes an object, giving up after `timeout` so a stalled backend cannot
/// hold the caller.
pub async fn delete_within(
    object_store: &dyn ObjectStore,
    object_id: &str,
    timeout: Duration,
) -> Result<(), ObjectStoreError> {
    match tokio::time::timeout(timeout, object_store.delete(object_id)).await {
        Ok(result) => result,
        Err(_) => Err(ObjectStoreError::Timeout(timeout.as_secs())),
    }
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3ObjectStore {
    /// Constructs an S3 client configured for MinIO (local) or AWS (production).
    pub async fn connect(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "resume-api-static",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&config.endpoint)
            .load()
            .await;

        // MinIO only speaks path-style addressing.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        info!(
            "S3 object store ready (bucket: {}, endpoint: {})",
            config.bucket, config.endpoint
        );

        S3ObjectStore {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, ObjectStoreError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Upload(DisplayErrorContext(&e).to_string()))?;

        debug!("Uploaded {size} bytes to s3://{}/{}", self.bucket, key);

        Ok(StoredObject {
            url: self.object_url(key),
            object_id: key.to_string(),
        })
    }

    async fn delete(&self, object_id: &str) -> Result<(), ObjectStoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(object_id)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Delete(DisplayErrorContext(&e).to_string()))?;

        debug!("Deleted s3://{}/{}", self.bucket, object_id);
        Ok(())
    }
}
