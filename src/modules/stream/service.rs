use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use super::dto::StreamInfo;
use super::manifest::read_rewritten;
use crate::common::media::{output_key, MANIFEST_FILE};
use crate::common::response::ApiError;
use crate::infrastructure::storage::{ObjectStore, ObjectStream, StorageError};
use crate::modules::video::model::{Video, VideoStatus};
use crate::modules::video::service::{VideoError, VideoService};

/// What a streaming client may learn about a failure. Details stay in the
/// logs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("Invalid path")]
    BadRequest,

    #[error("Video not found")]
    NotFound,

    #[error("Video not ready")]
    NotReady,

    #[error("Internal server error")]
    Internal,
}

impl StreamError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StreamError::BadRequest => StatusCode::BAD_REQUEST,
            StreamError::NotFound => StatusCode::NOT_FOUND,
            StreamError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            StreamError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        ApiError(self.to_string(), self.status_code()).into_response()
    }
}

/// Path components must be plain file names.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Read path of the Streaming Proxy. Only `READY` videos are ever served.
#[derive(Clone)]
pub struct StreamService {
    videos: VideoService,
    storage: Arc<dyn ObjectStore>,
    output_bucket: String,
    proxy_base: String,
}

impl StreamService {
    pub fn new(
        videos: VideoService,
        storage: Arc<dyn ObjectStore>,
        output_bucket: impl Into<String>,
        proxy_base: impl Into<String>,
    ) -> Self {
        Self {
            videos,
            storage,
            output_bucket: output_bucket.into(),
            proxy_base: proxy_base.into(),
        }
    }

    async fn ready_video(&self, video_id: &str) -> Result<Video, StreamError> {
        if !is_safe_name(video_id) {
            return Err(StreamError::BadRequest);
        }

        let video = match self.videos.find_by_id(video_id).await {
            Ok(video) => video,
            Err(VideoError::NotFound(_)) => return Err(StreamError::NotFound),
            Err(e) => {
                error!(video_id, error = %e, "Database Error");
                return Err(StreamError::Internal);
            }
        };

        if video.status != VideoStatus::Ready {
            return Err(StreamError::NotReady);
        }
        Ok(video)
    }

    async fn open(&self, video_id: &str, file_name: &str) -> Result<ObjectStream, StreamError> {
        let key = output_key(video_id, file_name);
        self.storage
            .open_stream(&self.output_bucket, &key)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => {
                    error!(video_id, key = %key, "video is READY but its object is missing");
                    StreamError::NotFound
                }
                other => {
                    error!(video_id, key = %key, error = %other, "S3 Error");
                    StreamError::Internal
                }
            })
    }

    async fn rewritten_manifest(&self, video_id: &str, file_name: &str) -> Result<String, StreamError> {
        let object = self.open(video_id, file_name).await?;
        read_rewritten(object.body, &self.proxy_base, video_id)
            .await
            .map_err(|e| {
                error!(video_id, error = %e, "Error reading playlist");
                StreamError::Internal
            })
    }

    /// Stored manifest with every segment reference routed through the proxy.
    pub async fn manifest(&self, video_id: &str, file_name: &str) -> Result<String, StreamError> {
        if !is_safe_name(file_name) {
            return Err(StreamError::BadRequest);
        }
        self.ready_video(video_id).await?;
        self.rewritten_manifest(video_id, file_name).await
    }

    pub async fn segment(&self, video_id: &str, file_name: &str) -> Result<ObjectStream, StreamError> {
        if !is_safe_name(file_name) {
            return Err(StreamError::BadRequest);
        }
        self.ready_video(video_id).await?;
        self.open(video_id, file_name).await
    }

    pub async fn info(&self, video_id: &str) -> Result<StreamInfo, StreamError> {
        let video = self.ready_video(video_id).await?;
        let playlist = self.rewritten_manifest(video_id, MANIFEST_FILE).await?;

        Ok(StreamInfo {
            hls_url: format!("{}/{}", self.proxy_base, video.id),
            video_id: video.id,
            title: video.title,
            description: video.description,
            status: video.status,
            playlist,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_with_separators_or_traversal_are_unsafe() {
        assert!(is_safe_name("segment_000.ts"));
        assert!(is_safe_name("3f0c8a0e-4b1d-4c7e-9b43-2f1e8d9f0a11"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name("../secret"));
        assert!(!is_safe_name("a/b.ts"));
        assert!(!is_safe_name("seg%20.ts"));
    }

    #[test]
    fn errors_map_to_client_status_codes() {
        assert_eq!(StreamError::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(StreamError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(StreamError::NotReady.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
