use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::common::media::{output_key, ArtifactKind, MANIFEST_FILE};
use crate::config::settings::{StorageConfig, WorkerConfig};
use crate::infrastructure::media::{TranscodeError, Transcoder};
use crate::infrastructure::queue::{Delivery, JobQueue};
use crate::infrastructure::storage::{BucketAccess, ObjectStore, StorageError};
use crate::modules::video::events::TranscodeJob;
use crate::modules::video::model::{StatusError, VideoStatus};
use crate::modules::video::service::{StatusChange, VideoError, VideoService};

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Where a job attempt was when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Received,
    Downloading,
    Transcoding,
    Uploading,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStage::Received => "received",
            JobStage::Downloading => "downloading",
            JobStage::Transcoding => "transcoding",
            JobStage::Uploading => "uploading",
        })
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to prepare working directory: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("download failed: {0}")]
    Download(#[source] StorageError),

    #[error("transcode failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("encoder produced no manifest")]
    MissingManifest,

    #[error("failed to prepare output bucket: {0}")]
    OutputBucket(#[source] StorageError),

    #[error("upload failed for {file}: {source}")]
    Upload {
        file: String,
        #[source]
        source: StorageError,
    },
}

impl JobError {
    pub fn stage(&self) -> JobStage {
        match self {
            JobError::Workspace(_) | JobError::Download(_) => JobStage::Downloading,
            JobError::Transcode(_) | JobError::MissingManifest => JobStage::Transcoding,
            JobError::OutputBucket(_) | JobError::Upload { .. } => JobStage::Uploading,
        }
    }
}

/// How a delivery was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Acked; the listed output keys were written.
    Ready { uploaded: Vec<String> },
    /// Nacked without requeue and the video marked `FAILED`.
    Failed { stage: JobStage },
    /// Poison message, nacked without requeue. No status was touched.
    Dropped,
}

/// Job Consumer: drives one video at a time from `PROCESSING` to `READY`
/// or `FAILED`.
pub struct TranscodeWorker {
    store: Arc<dyn ObjectStore>,
    videos: VideoService,
    transcoder: Arc<dyn Transcoder>,
    source_bucket: String,
    output_bucket: String,
    scratch_dir: PathBuf,
    output_ready: Mutex<OnceCell<()>>,
}

impl TranscodeWorker {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        videos: VideoService,
        transcoder: Arc<dyn Transcoder>,
        storage: &StorageConfig,
        worker: &WorkerConfig,
    ) -> Self {
        Self {
            store,
            videos,
            transcoder,
            source_bucket: storage.source_bucket.clone(),
            output_bucket: storage.output_bucket.clone(),
            scratch_dir: worker.scratch_dir.clone(),
            output_ready: Mutex::new(OnceCell::new()),
        }
    }

    /// Pull and process deliveries until `shutdown` fires or the queue
    /// fails. The job in flight when shutdown fires runs to completion.
    pub async fn run(&self, queue: &dyn JobQueue, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!("🎥 Starting Transcoder Worker...");
        let mut deliveries = queue.consume().await.context("failed to start consuming")?;

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = deliveries.next() => next,
            };

            match next {
                Some(Ok(delivery)) => match self.handle(delivery).await? {
                    JobOutcome::Ready { uploaded } => debug!(objects = uploaded.len(), "delivery acked"),
                    JobOutcome::Failed { stage } => debug!(%stage, "delivery rejected"),
                    JobOutcome::Dropped => debug!("delivery dropped"),
                },
                Some(Err(e)) => return Err(anyhow!(e).context("delivery stream failed")),
                None => {
                    warn!("delivery stream closed, resubscribing");
                    tokio::time::sleep(RESUBSCRIBE_DELAY).await;
                    deliveries = queue.consume().await.context("failed to resubscribe")?;
                }
            }
        }

        info!("shutdown requested, stopping consumer");
        if let Err(e) = queue.stop_consuming().await {
            warn!("failed to cancel consumer: {}", e);
        }
        Ok(())
    }

    /// Process one delivery and settle it.
    ///
    /// Errors are reserved for metadata-store or broker failures; the
    /// delivery is requeued where possible and the caller should stop.
    pub async fn handle(&self, delivery: Box<dyn Delivery>) -> anyhow::Result<JobOutcome> {
        let job = match TranscodeJob::decode(delivery.body()) {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "dropping malformed job");
                delivery.nack(false).await?;
                return Ok(JobOutcome::Dropped);
            }
        };

        let span = info_span!("transcode_job", video_id = %job.video_id, redelivered = delivery.redelivered());
        self.handle_job(job, delivery).instrument(span).await
    }

    async fn handle_job(&self, job: TranscodeJob, delivery: Box<dyn Delivery>) -> anyhow::Result<JobOutcome> {
        info!(stage = %JobStage::Received, file_path = %job.file_path, "📦 Received transcoding job");

        // A redelivered message for a FAILED video is the same attempt coming
        // back after a crash between the FAILED write and the nack.
        if delivery.redelivered() {
            match self.videos.find_by_id(&job.video_id).await {
                Ok(video) if video.status == VideoStatus::Failed => {
                    warn!("redelivered job already FAILED, dropping");
                    delivery.nack(false).await?;
                    return Ok(JobOutcome::Dropped);
                }
                Ok(_) | Err(VideoError::NotFound(_)) => {}
                Err(e) => return Err(requeue(delivery, e).await),
            }
        }

        match self.videos.update_status(&job.video_id, VideoStatus::Processing).await {
            Ok(StatusChange::Changed { from: VideoStatus::Failed, to }) => {
                info!(status = %to, "retrying a previously failed video");
            }
            Ok(StatusChange::Unchanged(status)) => {
                warn!(%status, "job was already in flight, taking it over");
            }
            Ok(_) => {}
            Err(VideoError::Status(StatusError::InvalidTransition { from: VideoStatus::Ready, .. })) => {
                info!("video already READY, re-running to refresh artifacts");
            }
            Err(e @ (VideoError::NotFound(_) | VideoError::Status(_))) => {
                warn!(error = %e, "dropping job that cannot start");
                delivery.nack(false).await?;
                return Ok(JobOutcome::Dropped);
            }
            Err(e) => return Err(requeue(delivery, e).await),
        }

        match self.process(&job).await {
            Ok(uploaded) => {
                match self.videos.update_status(&job.video_id, VideoStatus::Ready).await {
                    Ok(_) => {}
                    Err(VideoError::Status(se)) => {
                        warn!(error = %se, "artifacts stored but status not moved to READY");
                    }
                    Err(e) => return Err(requeue(delivery, e).await),
                }
                delivery.ack().await?;
                info!(objects = uploaded.len(), "✅ Job completed successfully");
                Ok(JobOutcome::Ready { uploaded })
            }
            Err(e) => {
                let stage = e.stage();
                error!(stage = %stage, error = %e, "❌ Job failed");

                match self.videos.update_status(&job.video_id, VideoStatus::Failed).await {
                    Ok(_) => {}
                    Err(VideoError::Status(se)) => {
                        warn!(error = %se, "leaving status as is");
                    }
                    Err(e) => return Err(requeue(delivery, e).await),
                }
                delivery.nack(false).await?;
                Ok(JobOutcome::Failed { stage })
            }
        }
    }

    /// Download, transcode and upload. The working directory is removed
    /// when this returns or is cancelled.
    async fn process(&self, job: &TranscodeJob) -> Result<Vec<String>, JobError> {
        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(JobError::Workspace)?;
        let workspace = tempfile::Builder::new()
            .prefix("transcode-")
            .tempdir_in(&self.scratch_dir)
            .map_err(JobError::Workspace)?;

        let source = workspace.path().join(source_file_name(&job.file_path));

        info!(stage = %JobStage::Downloading, key = %job.file_path, "⬇️ Downloading source");
        self.store
            .fetch_to_local(&self.source_bucket, &job.file_path, &source)
            .await
            .map_err(JobError::Download)?;

        info!(stage = %JobStage::Transcoding, "Transcoding to HLS");
        self.transcoder.transcode(&source, workspace.path()).await?;

        let outputs = list_outputs(workspace.path(), &source)
            .await
            .map_err(JobError::Workspace)?;
        if !outputs.iter().any(|name| name == MANIFEST_FILE) {
            return Err(JobError::MissingManifest);
        }

        info!(stage = %JobStage::Uploading, files = outputs.len(), "Uploading artifacts");
        self.prepare_output_bucket().await.map_err(JobError::OutputBucket)?;

        let mut uploaded = Vec::with_capacity(outputs.len());
        for name in outputs {
            let key = output_key(&job.video_id, &name);
            let content_type = ArtifactKind::from_file_name(&name).content_type();

            let local = workspace.path().join(&name);
            let result = match self.store.put_local(&local, &self.output_bucket, &key, content_type).await {
                Err(StorageError::BucketNotFound(_)) => {
                    warn!(bucket = %self.output_bucket, "output bucket disappeared, recreating");
                    self.forget_output_bucket().await;
                    self.prepare_output_bucket().await.map_err(JobError::OutputBucket)?;
                    self.store.put_local(&local, &self.output_bucket, &key, content_type).await
                }
                other => other,
            };
            result.map_err(|source| JobError::Upload { file: name.clone(), source })?;

            uploaded.push(key);
        }

        Ok(uploaded)
    }

    async fn prepare_output_bucket(&self) -> Result<(), StorageError> {
        let ready = self.output_ready.lock().await;
        ready
            .get_or_try_init(|| self.store.ensure_bucket(&self.output_bucket, BucketAccess::PublicRead))
            .await
            .map(|_| ())
    }

    async fn forget_output_bucket(&self) {
        self.output_ready.lock().await.take();
    }
}

/// Nack with requeue after a transport failure and hand back the error.
async fn requeue(delivery: Box<dyn Delivery>, cause: VideoError) -> anyhow::Error {
    error!(error = %cause, "metadata store unavailable, requeueing job");
    if let Err(e) = delivery.nack(true).await {
        warn!("failed to requeue delivery: {}", e);
    }
    anyhow!(cause)
}

/// Local name of the downloaded source; keeps the upload's extension so the
/// encoder can probe by name.
fn source_file_name(file_path: &str) -> String {
    match Path::new(file_path).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("input.{}", ext),
        None => "input".to_string(),
    }
}

/// Regular files in `dir` other than `source`, sorted by name.
async fn list_outputs(dir: &Path, source: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() || entry.path() == source {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}
