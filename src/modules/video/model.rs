use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum VideoStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("invalid video status: {0}")]
    Unknown(String),

    #[error("status cannot move from {from} to {to}")]
    InvalidTransition { from: VideoStatus, to: VideoStatus },
}

impl VideoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VideoStatus::Pending => "PENDING",
            VideoStatus::Processing => "PROCESSING",
            VideoStatus::Ready => "READY",
            VideoStatus::Failed => "FAILED",
        }
    }

    /// Whether a write of `next` over `self` is allowed.
    ///
    /// `PENDING -> PROCESSING -> {READY, FAILED}`. A processing job may be
    /// picked up again after a crash, a failed one may be resubmitted, and
    /// rewriting a terminal status is a no-op.
    pub fn can_transition_to(self, next: VideoStatus) -> bool {
        use VideoStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Failed, Processing)
                | (Processing, Processing)
                | (Processing, Ready)
                | (Processing, Failed)
                | (Ready, Ready)
                | (Failed, Failed)
        )
    }

    pub fn transition(self, next: VideoStatus) -> Result<VideoStatus, StatusError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StatusError::InvalidTransition { from: self, to: next })
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(VideoStatus::Pending),
            "PROCESSING" => Ok(VideoStatus::Processing),
            "READY" => Ok(VideoStatus::Ready),
            "FAILED" => Ok(VideoStatus::Failed),
            other => Err(StatusError::Unknown(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Video {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    /// Object key of the raw upload in the source bucket.
    pub file_name: String,
    pub status: VideoStatus,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: OffsetDateTime,
}

/// Row shape in Postgres; status is stored as plain text.
#[derive(Debug, FromRow)]
pub struct VideoRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub file_name: String,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<VideoRow> for Video {
    type Error = StatusError;

    fn try_from(row: VideoRow) -> Result<Self, Self::Error> {
        Ok(Video {
            status: row.status.parse()?,
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            file_name: row.file_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub user_id: String,
    pub title: String,
    pub description: String,
    /// Name of the file as uploaded by the client, e.g. `holiday.mp4`.
    pub original_name: String,
}
