use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::config::env::{self, EnvKey, MissingVar, ProcessEnv, Source};

/// Which halves of the service this process runs.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    Api,
    Worker,
    All,
}

impl AppMode {
    pub fn runs_api(self) -> bool {
        matches!(self, AppMode::Api | AppMode::All)
    }

    pub fn runs_worker(self) -> bool {
        matches!(self, AppMode::Worker | AppMode::All)
    }
}

impl FromStr for AppMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "api" => Ok(AppMode::Api),
            "worker" => Ok(AppMode::Worker),
            "all" => Ok(AppMode::All),
            other => Err(format!("unknown app mode: {other}")),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub source_bucket: String,
    pub output_bucket: String,
    pub presign_ttl: Duration,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QueueConfig {
    pub url: String,
    pub queue_name: String,
    pub consumer_tag: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TranscoderConfig {
    pub ffmpeg_path: String,
    pub segment_seconds: u32,
    pub video_codec: String,
    pub audio_codec: String,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            segment_seconds: 10,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct WorkerConfig {
    /// Parent directory for per-job scratch directories.
    pub scratch_dir: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StreamConfig {
    /// Prefix of the proxied segment URLs written into manifests.
    pub proxy_base: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub mode: AppMode,
    pub database_url: String,
    pub queue: QueueConfig,
    pub storage: StorageConfig,
    pub transcoder: TranscoderConfig,
    pub worker: WorkerConfig,
    pub stream: StreamConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self, MissingVar> {
        Self::from_source(&ProcessEnv)
    }

    pub fn from_source(src: &impl Source) -> Result<Self, MissingVar> {
        let defaults = TranscoderConfig::default();

        Ok(Self {
            server_port: env::get_parsed(src, EnvKey::ServerPort, 3000),
            mode: env::get_parsed(src, EnvKey::AppMode, AppMode::All),
            database_url: env::get(src, EnvKey::DatabaseUrl)?,
            queue: QueueConfig {
                url: env::get(src, EnvKey::RabbitMqUrl)?,
                queue_name: env::get_or(src, EnvKey::TranscodeQueue, "video_encoding_queue"),
                consumer_tag: env::get_or(src, EnvKey::ConsumerTag, "transcoder_worker"),
            },
            storage: StorageConfig {
                endpoint: env::get(src, EnvKey::MinioUrl)?,
                region: env::get_or(src, EnvKey::MinioRegion, "us-east-1"),
                access_key: env::get(src, EnvKey::MinioAccessKey)?,
                secret_key: env::get(src, EnvKey::MinioSecretKey)?,
                source_bucket: env::get_or(src, EnvKey::SourceBucket, "gostream"),
                output_bucket: env::get_or(src, EnvKey::OutputBucket, "hls-videos"),
                presign_ttl: Duration::from_secs(env::get_parsed(src, EnvKey::PresignTtlSecs, 900)),
            },
            transcoder: TranscoderConfig {
                ffmpeg_path: env::get_or(src, EnvKey::FfmpegPath, &defaults.ffmpeg_path),
                segment_seconds: env::get_parsed(src, EnvKey::SegmentSeconds, defaults.segment_seconds),
                ..defaults
            },
            worker: WorkerConfig {
                scratch_dir: env::get_opt(src, EnvKey::ScratchDir)
                    .map(PathBuf::from)
                    .unwrap_or_else(std::env::temp_dir),
            },
            stream: StreamConfig {
                proxy_base: env::get_or(src, EnvKey::StreamProxyBase, "/stream")
                    .trim_end_matches('/')
                    .to_string(),
            },
        })
    }
}
