use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::modules::video::model::VideoStatus;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct StreamQuery {
    /// `true` returns a metadata document instead of the raw manifest; any
    /// other value is ignored.
    pub info: Option<String>,
}

impl StreamQuery {
    pub fn wants_info(&self) -> bool {
        self.info.as_deref() == Some("true")
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StreamInfo {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub status: VideoStatus,
    pub hls_url: String,
    /// Manifest body with proxied segment URLs.
    pub playlist: String,
}
