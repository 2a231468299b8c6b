use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream as S3ByteStream;
use aws_sdk_s3::Client;
use futures_util::TryStreamExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use super::{public_read_policy, BucketAccess, ObjectStore, ObjectStream, StorageError, StorageResult};
use crate::config::settings::StorageConfig;

fn backend_error<E: std::error::Error>(err: E) -> StorageError {
    StorageError::Backend(DisplayErrorContext(err).to_string())
}

/// Object Store Gateway backed by an S3-compatible service (MinIO in
/// development).
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(&config.access_key, &config.secret_key, None, None, "static");

        let s3_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        info!(endpoint = %config.endpoint, "S3 client configured");

        Self {
            client: Client::from_conf(s3_config),
        }
    }

    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(backend_error(e)),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn fetch_to_local(&self, bucket: &str, key: &str, local_path: &Path) -> StorageResult<()> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_no_such_key() => StorageError::NotFound(format!("{}/{}", bucket, key)),
                _ => backend_error(e),
            })?;

        let mut reader = resp.body.into_async_read();
        let mut file = tokio::fs::File::create(local_path).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        debug!(bucket, key, bytes = written, "object downloaded");

        Ok(())
    }

    async fn put_local(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let body = S3ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to read {}: {}", local_path.display(), e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.meta().code() == Some("NoSuchBucket") => {
                    StorageError::BucketNotFound(bucket.to_string())
                }
                _ => backend_error(e),
            })?;

        Ok(())
    }

    async fn ensure_bucket(&self, bucket: &str, access: BucketAccess) -> StorageResult<()> {
        if !self.bucket_exists(bucket).await? {
            info!(bucket, "bucket does not exist, creating it");
            match self.client.create_bucket().bucket(bucket).send().await {
                Ok(_) => {}
                Err(e)
                    if e.as_service_error().is_some_and(|se| {
                        se.is_bucket_already_owned_by_you() || se.is_bucket_already_exists()
                    }) =>
                {
                    debug!(bucket, "bucket created concurrently");
                }
                Err(e) => return Err(backend_error(e)),
            }
        }

        // Reapplied every time so a bucket created by a racing worker still
        // ends up readable.
        if access == BucketAccess::PublicRead {
            self.client
                .put_bucket_policy()
                .bucket(bucket)
                .policy(public_read_policy(bucket))
                .send()
                .await
                .map_err(backend_error)?;
        }

        Ok(())
    }

    async fn open_stream(&self, bucket: &str, key: &str) -> StorageResult<ObjectStream> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_no_such_key() => StorageError::NotFound(format!("{}/{}", bucket, key)),
                _ => backend_error(e),
            })?;

        let size = resp.content_length().unwrap_or_default().max(0) as u64;
        let body = ReaderStream::new(resp.body.into_async_read()).map_err(StorageError::from);

        Ok(ObjectStream {
            body: Box::pin(body),
            size,
        })
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn presign_put(&self, bucket: &str, key: &str, ttl: Duration) -> StorageResult<String> {
        let presigning = PresigningConfig::expires_in(ttl).map_err(|e| StorageError::Presign(e.to_string()))?;

        let request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(DisplayErrorContext(e).to_string()))?;

        Ok(request.uri().to_string())
    }

    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> StorageResult<String> {
        let presigning = PresigningConfig::expires_in(ttl).map_err(|e| StorageError::Presign(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(DisplayErrorContext(e).to_string()))?;

        Ok(request.uri().to_string())
    }
}
