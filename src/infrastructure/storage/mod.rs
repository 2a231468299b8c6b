pub mod s3;

use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("presign failed: {0}")]
    Presign(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Body of a stored object plus the size recorded by the store.
pub struct ObjectStream {
    pub body: ByteStream,
    pub size: u64,
}

/// Access policy applied when a bucket is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketAccess {
    Private,
    /// Anonymous `GetObject` on every key.
    PublicRead,
}

/// Capability over a bucket-oriented object store.
///
/// Every operation names its bucket explicitly: raw uploads live in a
/// private source bucket, transcode output in a public one.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download `key` into `local_path`, creating or truncating the file.
    async fn fetch_to_local(&self, bucket: &str, key: &str, local_path: &Path) -> StorageResult<()>;

    /// Upload the file at `local_path` to `key`, overwriting any previous object.
    async fn put_local(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Create `bucket` when absent. Safe to race with other callers.
    async fn ensure_bucket(&self, bucket: &str, access: BucketAccess) -> StorageResult<()>;

    async fn open_stream(&self, bucket: &str, key: &str) -> StorageResult<ObjectStream>;

    async fn stat_object(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    async fn presign_put(&self, bucket: &str, key: &str, ttl: Duration) -> StorageResult<String>;

    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> StorageResult<String>;
}

/// Bucket policy granting anonymous read on every object of `bucket`.
pub fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "AWS": ["*"] },
            "Action": ["s3:GetObject"],
            "Resource": [format!("arn:aws:s3:::{}/*", bucket)],
        }]
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_policy_only_grants_object_reads() {
        let policy: serde_json::Value = serde_json::from_str(&public_read_policy("hls-videos")).unwrap();
        let statement = &policy["Statement"][0];

        assert_eq!(statement["Effect"], "Allow");
        assert_eq!(statement["Action"], serde_json::json!(["s3:GetObject"]));
        assert_eq!(statement["Resource"], serde_json::json!(["arn:aws:s3:::hls-videos/*"]));
    }
}
