use serde::{Deserialize, Serialize};
use validator::Validate;

/// Queue message asking for one video to be transcoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TranscodeJob {
    #[validate(length(min = 1))]
    pub video_id: String,
    /// Object key of the raw upload in the source bucket.
    #[validate(length(min = 1))]
    pub file_path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed job body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid job: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl TranscodeJob {
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let job: TranscodeJob = serde_json::from_slice(body)?;
        job.validate()?;
        Ok(job)
    }
}
