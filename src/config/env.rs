use std::str::FromStr;

use tracing::warn;

pub enum EnvKey {
    ServerPort,
    AppMode,
    DatabaseUrl,
    RabbitMqUrl,
    TranscodeQueue,
    ConsumerTag,
    MinioUrl,
    MinioRegion,
    MinioAccessKey,
    MinioSecretKey,
    SourceBucket,
    OutputBucket,
    PresignTtlSecs,
    FfmpegPath,
    SegmentSeconds,
    ScratchDir,
    StreamProxyBase,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::AppMode => "APP_MODE",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::RabbitMqUrl => "RABBITMQ_URL",
            EnvKey::TranscodeQueue => "TRANSCODE_QUEUE",
            EnvKey::ConsumerTag => "TRANSCODE_CONSUMER_TAG",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioRegion => "MINIO_REGION",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::SourceBucket => "MINIO_SOURCE_BUCKET",
            EnvKey::OutputBucket => "MINIO_OUTPUT_BUCKET",
            EnvKey::PresignTtlSecs => "PRESIGN_TTL_SECS",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::SegmentSeconds => "HLS_SEGMENT_SECONDS",
            EnvKey::ScratchDir => "TRANSCODE_SCRATCH_DIR",
            EnvKey::StreamProxyBase => "STREAM_PROXY_BASE",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("missing required environment variable {0}")]
pub struct MissingVar(pub &'static str);

/// Where configuration values come from. The process environment in
/// production, a plain map in tests.
pub trait Source {
    fn lookup(&self, key: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl Source for ProcessEnv {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Source for std::collections::HashMap<&'static str, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

pub fn get(src: &impl Source, key: EnvKey) -> Result<String, MissingVar> {
    src.lookup(key.as_str()).ok_or(MissingVar(key.as_str()))
}

pub fn get_or(src: &impl Source, key: EnvKey, default: &str) -> String {
    src.lookup(key.as_str()).unwrap_or_else(|| default.to_string())
}

pub fn get_opt(src: &impl Source, key: EnvKey) -> Option<String> {
    src.lookup(key.as_str()).filter(|v| !v.is_empty())
}

/// Parsed value of `key`, or `default` when unset. A value that does not
/// parse is logged and replaced by `default`.
pub fn get_parsed<T: FromStr>(src: &impl Source, key: EnvKey, default: T) -> T {
    match src.lookup(key.as_str()) {
        Some(val) => match val.parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(key = key.as_str(), value = %val, "invalid configuration value, using default");
                default
            }
        },
        None => default,
    }
}
