use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::{TranscodeError, Transcoder};
use crate::common::media::{MANIFEST_FILE, SEGMENT_PATTERN};
use crate::config::settings::TranscoderConfig;

/// Single-rendition VOD HLS encoder driven through the ffmpeg CLI.
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
}

impl FfmpegTranscoder {
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    fn args(&self, source: &Path, output_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        args.push("-i".into());
        args.push(source.as_os_str().to_owned());

        for (flag, value) in [
            ("-codec:v", self.config.video_codec.clone()),
            ("-codec:a", self.config.audio_codec.clone()),
            ("-hls_time", self.config.segment_seconds.to_string()),
            ("-hls_playlist_type", "vod".to_string()),
        ] {
            args.push(flag.into());
            args.push(value.into());
        }

        args.push("-hls_segment_filename".into());
        args.push(output_dir.join(SEGMENT_PATTERN).into_os_string());
        args.push("-start_number".into());
        args.push("0".into());
        args.push("-y".into());
        args.push(output_dir.join(MANIFEST_FILE).into_os_string());
        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    #[tracing::instrument(skip(self), fields(encoder = %self.config.ffmpeg_path))]
    async fn transcode(&self, source: &Path, output_dir: &Path) -> Result<(), TranscodeError> {
        let start = std::time::Instant::now();

        let output = Command::new(&self.config.ffmpeg_path)
            .args(self.args(source, output_dir))
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(TranscodeError::Failed {
                status: output.status.to_string(),
                output: combined,
            });
        }

        debug!(stderr_bytes = output.stderr.len(), "encoder finished");
        info!(elapsed_ms = start.elapsed().as_millis() as u64, "transcode complete");
        Ok(())
    }
}
