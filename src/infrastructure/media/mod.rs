pub mod ffmpeg;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to start encoder: {0}")]
    Spawn(#[from] std::io::Error),

    /// Non-zero exit; carries the encoder's combined stdout/stderr.
    #[error("encoder exited with {status}: {output}")]
    Failed { status: String, output: String },
}

/// Turns one local source file into an HLS manifest plus segments.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, source: &Path, output_dir: &Path) -> Result<(), TranscodeError>;
}
