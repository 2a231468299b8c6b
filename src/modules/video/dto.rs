use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use validator::Validate;

use super::model::{NewVideo, Video, VideoStatus};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateVideoRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    /// Name of the file the client is about to upload, e.g. `holiday.mp4`.
    #[validate(length(min = 1, message = "File name is required"))]
    pub file_name: String,
}

impl CreateVideoRequest {
    pub fn into_new_video(self, user_id: String) -> NewVideo {
        NewVideo {
            user_id,
            title: self.title,
            description: self.description.unwrap_or_default(),
            original_name: self.file_name,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VideoResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub file_name: String,
    pub status: VideoStatus,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
}

impl From<Video> for VideoResponse {
    fn from(v: Video) -> Self {
        Self {
            id: v.id,
            title: v.title,
            description: v.description,
            file_name: v.file_name,
            status: v.status,
            created_at: v.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadUrlResponse {
    pub video_id: String,
    /// Presigned PUT URL for the raw file.
    pub upload_url: String,
    pub expires_in_secs: u64,
}
