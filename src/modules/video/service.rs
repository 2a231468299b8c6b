use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::events::TranscodeJob;
use super::model::{NewVideo, StatusError, Video, VideoStatus};
use super::repository::VideoRepository;
use crate::infrastructure::queue::{JobQueue, QueueError};
use crate::infrastructure::storage::{BucketAccess, ObjectStore, StorageError};

/// Compare-and-set attempts before a status write gives up.
const STATUS_WRITE_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("video not found: {0}")]
    NotFound(String),

    #[error("video does not belong to the current user")]
    Forbidden,

    #[error("video file not found in storage: {0}")]
    SourceMissing(String),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("status of video {0} kept changing under concurrent writes")]
    Contended(String),

    #[error("metadata store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Outcome of a status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Changed { from: VideoStatus, to: VideoStatus },
    Unchanged(VideoStatus),
}

#[derive(Clone)]
pub struct VideoService {
    repo: Arc<dyn VideoRepository>,
    storage: Arc<dyn ObjectStore>,
    queue: Arc<dyn JobQueue>,
    source_bucket: String,
    presign_ttl: Duration,
}

impl VideoService {
    pub fn new(
        repo: Arc<dyn VideoRepository>,
        storage: Arc<dyn ObjectStore>,
        queue: Arc<dyn JobQueue>,
        source_bucket: impl Into<String>,
        presign_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            storage,
            queue,
            source_bucket: source_bucket.into(),
            presign_ttl,
        }
    }

    pub fn presign_ttl(&self) -> Duration {
        self.presign_ttl
    }

    /// Create the private bucket raw uploads land in.
    pub async fn prepare_source_bucket(&self) -> Result<(), VideoError> {
        self.storage
            .ensure_bucket(&self.source_bucket, BucketAccess::Private)
            .await?;
        Ok(())
    }

    pub async fn create_video(&self, video: NewVideo) -> Result<Video, VideoError> {
        let created = self.repo.create(video).await?;
        info!(video_id = %created.id, "video record created");
        Ok(created)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Video, VideoError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| VideoError::NotFound(id.to_string()))
    }

    /// Write `next`, validating the move against the current status.
    ///
    /// The store update is conditional on the status that was read, so a
    /// racing writer forces a re-read instead of being overwritten.
    pub async fn update_status(&self, id: &str, next: VideoStatus) -> Result<StatusChange, VideoError> {
        for _ in 0..STATUS_WRITE_ATTEMPTS {
            let current = self.find_by_id(id).await?.status;
            current.transition(next)?;

            if current == next {
                debug!(video_id = id, status = %next, "status already set");
                return Ok(StatusChange::Unchanged(current));
            }

            if self.repo.update_status(id, current, next).await? {
                info!(video_id = id, from = %current, to = %next, "status updated");
                return Ok(StatusChange::Changed { from: current, to: next });
            }

            warn!(video_id = id, "status changed concurrently, retrying");
        }

        Err(VideoError::Contended(id.to_string()))
    }

    async fn owned_video(&self, user_id: &str, video_id: &str) -> Result<Video, VideoError> {
        let video = self.find_by_id(video_id).await?;
        if video.user_id != user_id {
            return Err(VideoError::Forbidden);
        }
        Ok(video)
    }

    /// Time-limited link the owner uses to PUT the raw file straight into
    /// the source bucket.
    pub async fn presign_upload(&self, user_id: &str, video_id: &str) -> Result<String, VideoError> {
        let video = self.owned_video(user_id, video_id).await?;
        let url = self
            .storage
            .presign_put(&self.source_bucket, &video.file_name, self.presign_ttl)
            .await?;
        Ok(url)
    }

    /// Time-limited GET link to the owner's raw upload.
    pub async fn presign_download(&self, user_id: &str, video_id: &str) -> Result<String, VideoError> {
        let video = self.owned_video(user_id, video_id).await?;
        if !self.storage.stat_object(&self.source_bucket, &video.file_name).await? {
            return Err(VideoError::SourceMissing(video.file_name));
        }
        let url = self
            .storage
            .presign_get(&self.source_bucket, &video.file_name, self.presign_ttl)
            .await?;
        Ok(url)
    }

    /// Hand the uploaded file to the transcode pipeline.
    ///
    /// The raw object must already exist. Status stays `PENDING` until a
    /// consumer picks the job up.
    pub async fn complete_upload(&self, user_id: &str, video_id: &str) -> Result<(), VideoError> {
        let video = self.owned_video(user_id, video_id).await?;

        if !self.storage.stat_object(&self.source_bucket, &video.file_name).await? {
            return Err(VideoError::SourceMissing(video.file_name));
        }

        let job = TranscodeJob {
            video_id: video.id,
            file_path: video.file_name,
        };
        self.queue.publish(&job).await?;
        info!(video_id = %job.video_id, file_path = %job.file_path, "transcode job published");

        Ok(())
    }
}
