//! In-memory stand-ins for the external collaborators, used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{stream, FutureExt, StreamExt};
use time::OffsetDateTime;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::common::media::{MANIFEST_FILE, SEGMENT_SUFFIX};
use crate::infrastructure::media::{TranscodeError, Transcoder};
use crate::infrastructure::queue::{Delivery, DeliveryStream, JobQueue, QueueError};
use crate::infrastructure::storage::{BucketAccess, ObjectStore, ObjectStream, StorageError, StorageResult};
use crate::modules::video::events::TranscodeJob;
use crate::modules::video::model::{NewVideo, Video, VideoStatus};
use crate::modules::stream::service::StreamService;
use crate::modules::video::repository::VideoRepository;
use crate::modules::video::service::VideoService;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    buckets: Mutex<HashMap<String, BucketAccess>>,
    /// Number of successful puts allowed before every put fails.
    put_budget: Mutex<Option<usize>>,
}

impl MemoryStore {
    pub fn insert(&self, bucket: &str, key: &str, data: Vec<u8>, content_type: &str) {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_insert(BucketAccess::Private);
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
    }

    pub fn remove(&self, bucket: &str, key: &str) {
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn bucket_access(&self, bucket: &str) -> Option<BucketAccess> {
        self.buckets.lock().unwrap().get(bucket).copied()
    }

    /// Delete `bucket` and everything in it.
    pub fn drop_bucket(&self, bucket: &str) {
        self.buckets.lock().unwrap().remove(bucket);
        self.objects.lock().unwrap().retain(|(b, _), _| b != bucket);
    }

    pub fn fail_puts_after(&self, successful: usize) {
        *self.put_budget.lock().unwrap() = Some(successful);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn fetch_to_local(&self, bucket: &str, key: &str, local_path: &Path) -> StorageResult<()> {
        let object = self
            .object(bucket, key)
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, key)))?;
        tokio::fs::write(local_path, object.data).await?;
        Ok(())
    }

    async fn put_local(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        if !self.buckets.lock().unwrap().contains_key(bucket) {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }
        if let Some(budget) = self.put_budget.lock().unwrap().as_mut() {
            if *budget == 0 {
                return Err(StorageError::Backend("injected put failure".to_string()));
            }
            *budget -= 1;
        }
        let data = tokio::fs::read(local_path).await?;
        self.insert(bucket, key, data, content_type);
        Ok(())
    }

    async fn ensure_bucket(&self, bucket: &str, access: BucketAccess) -> StorageResult<()> {
        let mut buckets = self.buckets.lock().unwrap();
        let entry = buckets.entry(bucket.to_string()).or_insert(access);
        if access == BucketAccess::PublicRead {
            *entry = access;
        }
        Ok(())
    }

    async fn open_stream(&self, bucket: &str, key: &str) -> StorageResult<ObjectStream> {
        let object = self
            .object(bucket, key)
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, key)))?;
        let size = object.data.len() as u64;
        // Small chunks so readers see lines split across chunk boundaries.
        let chunks: Vec<StorageResult<Bytes>> = object
            .data
            .chunks(7)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        Ok(ObjectStream {
            body: stream::iter(chunks).boxed(),
            size,
        })
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        Ok(self.object(bucket, key).is_some())
    }

    async fn presign_put(&self, bucket: &str, key: &str, ttl: Duration) -> StorageResult<String> {
        Ok(format!("http://memory/{}/{}?method=PUT&ttl={}", bucket, key, ttl.as_secs()))
    }

    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> StorageResult<String> {
        Ok(format!("http://memory/{}/{}?method=GET&ttl={}", bucket, key, ttl.as_secs()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    Nack { requeue: bool },
}

#[derive(Default)]
pub struct MemoryQueue {
    published: Mutex<Vec<TranscodeJob>>,
    pending: Mutex<VecDeque<Vec<u8>>>,
    settlements: Arc<Mutex<Vec<Settlement>>>,
    stopped: AtomicBool,
}

impl MemoryQueue {
    pub fn push_raw(&self, body: &[u8]) {
        self.pending.lock().unwrap().push_back(body.to_vec());
    }

    pub fn published(&self) -> Vec<TranscodeJob> {
        self.published.lock().unwrap().clone()
    }

    pub fn settlements(&self) -> Vec<Settlement> {
        self.settlements.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// A standalone delivery whose settlement is recorded on this queue.
    pub fn delivery(&self, body: &[u8]) -> Box<dyn Delivery> {
        Box::new(MemoryDelivery {
            body: body.to_vec(),
            redelivered: false,
            log: self.settlements.clone(),
        })
    }

    pub fn job_delivery(&self, job: &TranscodeJob) -> Box<dyn Delivery> {
        self.delivery(&serde_json::to_vec(job).unwrap())
    }

    /// The same job handed out again by the broker.
    pub fn redelivery(&self, job: &TranscodeJob) -> Box<dyn Delivery> {
        Box::new(MemoryDelivery {
            body: serde_json::to_vec(job).unwrap(),
            redelivered: true,
            log: self.settlements.clone(),
        })
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn publish(&self, job: &TranscodeJob) -> Result<(), QueueError> {
        self.published.lock().unwrap().push(job.clone());
        self.pending.lock().unwrap().push_back(serde_json::to_vec(job)?);
        Ok(())
    }

    async fn consume(&self) -> Result<DeliveryStream, QueueError> {
        let drained: Vec<Result<Box<dyn Delivery>, QueueError>> = self
            .pending
            .lock()
            .unwrap()
            .drain(..)
            .map(|body| Ok(self.delivery(&body)))
            .collect();

        Ok(stream::iter(drained).chain(stream::pending()).boxed())
    }

    async fn stop_consuming(&self) -> Result<(), QueueError> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MemoryDelivery {
    body: Vec<u8>,
    redelivered: bool,
    log: Arc<Mutex<Vec<Settlement>>>,
}

impl Delivery for MemoryDelivery {
    fn body(&self) -> &[u8] {
        &self.body
    }

    fn redelivered(&self) -> bool {
        self.redelivered
    }

    fn ack(self: Box<Self>) -> BoxFuture<'static, Result<(), QueueError>> {
        self.log.lock().unwrap().push(Settlement::Ack);
        async { Ok(()) }.boxed()
    }

    fn nack(self: Box<Self>, requeue: bool) -> BoxFuture<'static, Result<(), QueueError>> {
        self.log.lock().unwrap().push(Settlement::Nack { requeue });
        async { Ok(()) }.boxed()
    }
}

#[derive(Default)]
pub struct MemoryVideoRepository {
    videos: Mutex<HashMap<String, Video>>,
    writes: Mutex<HashMap<String, usize>>,
    fail_writes: AtomicBool,
}

impl MemoryVideoRepository {
    pub fn insert(&self, id: &str, user_id: &str, status: VideoStatus) {
        let now = OffsetDateTime::now_utc();
        self.videos.lock().unwrap().insert(
            id.to_string(),
            Video {
                id: id.to_string(),
                user_id: user_id.to_string(),
                title: format!("Video {}", id),
                description: "test video".to_string(),
                file_name: format!("raw/{}.mp4", id),
                status,
                created_at: now,
                updated_at: now,
            },
        );
    }

    pub fn status(&self, id: &str) -> Option<VideoStatus> {
        self.videos.lock().unwrap().get(id).map(|v| v.status)
    }

    /// Status writes that actually changed the stored value.
    pub fn status_writes(&self, id: &str) -> usize {
        self.writes.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn fail_status_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl VideoRepository for MemoryVideoRepository {
    async fn create(&self, video: NewVideo) -> anyhow::Result<Video> {
        let id = Uuid::new_v4().to_string();
        let now = OffsetDateTime::now_utc();
        let created = Video {
            file_name: format!("{}.{}", id, video.original_name),
            id: id.clone(),
            user_id: video.user_id,
            title: video.title,
            description: video.description,
            status: VideoStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.videos.lock().unwrap().insert(id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Video>> {
        Ok(self.videos.lock().unwrap().get(id).cloned())
    }

    async fn update_status(&self, id: &str, from: VideoStatus, to: VideoStatus) -> anyhow::Result<bool> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }
        let mut videos = self.videos.lock().unwrap();
        match videos.get_mut(id) {
            Some(video) if video.status == from => {
                video.status = to;
                video.updated_at = OffsetDateTime::now_utc();
                *self.writes.lock().unwrap().entry(id.to_string()).or_default() += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Writes a VOD manifest and `segments` segment files, like ffmpeg would
/// for a source of `segments * 10` seconds.
pub struct FakeTranscoder {
    pub segments: usize,
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, source: &Path, output_dir: &Path) -> Result<(), TranscodeError> {
        let input = tokio::fs::read(source).await?;

        let mut manifest = String::from(
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n#EXT-X-MEDIA-SEQUENCE:0\n#EXT-X-PLAYLIST-TYPE:VOD\n",
        );
        for i in 0..self.segments {
            let name = format!("segment_{:03}{}", i, SEGMENT_SUFFIX);
            let mut data = format!("segment {} of ", i).into_bytes();
            data.extend_from_slice(&input);
            tokio::fs::write(output_dir.join(&name), data).await?;
            manifest.push_str("#EXTINF:10.000000,\n");
            manifest.push_str(&name);
            manifest.push('\n');
        }
        manifest.push_str("#EXT-X-ENDLIST\n");
        tokio::fs::write(output_dir.join(MANIFEST_FILE), manifest).await?;
        Ok(())
    }
}

/// Leaves a partial segment behind and exits non-zero.
pub struct FailingTranscoder;

#[async_trait]
impl Transcoder for FailingTranscoder {
    async fn transcode(&self, _source: &Path, output_dir: &Path) -> Result<(), TranscodeError> {
        tokio::fs::write(output_dir.join("segment_000.ts"), b"partial").await?;
        Err(TranscodeError::Failed {
            status: "exit status: 1".to_string(),
            output: "moov atom not found".to_string(),
        })
    }
}

/// Writes one segment, signals `started`, then never finishes.
pub struct StalledTranscoder {
    pub started: Arc<Notify>,
}

#[async_trait]
impl Transcoder for StalledTranscoder {
    async fn transcode(&self, _source: &Path, output_dir: &Path) -> Result<(), TranscodeError> {
        tokio::fs::write(output_dir.join("segment_000.ts"), b"partial").await?;
        self.started.notify_one();
        std::future::pending::<()>().await;
        Ok(())
    }
}

pub const SOURCE_BUCKET: &str = "gostream";
pub const OUTPUT_BUCKET: &str = "hls-videos";

/// Application state over in-memory collaborators, proxying under `/stream`.
pub fn app_state(repo: Arc<MemoryVideoRepository>, store: Arc<MemoryStore>, queue: Arc<MemoryQueue>) -> AppState {
    let videos = VideoService::new(repo, store.clone(), queue, SOURCE_BUCKET, Duration::from_secs(900));
    let stream = StreamService::new(videos.clone(), store, OUTPUT_BUCKET, "/stream");
    AppState::new(videos, stream)
}
