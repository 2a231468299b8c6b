//! File naming and content types of the HLS artifacts the pipeline produces.

pub const MANIFEST_FILE: &str = "index.m3u8";
pub const MANIFEST_SUFFIX: &str = ".m3u8";
pub const SEGMENT_SUFFIX: &str = ".ts";
/// Numbering pattern handed to the encoder; `%03d` grows past three digits
/// on long inputs.
pub const SEGMENT_PATTERN: &str = "segment_%03d.ts";
pub const DIRECTIVE_PREFIX: char = '#';

pub const MANIFEST_CONTENT_TYPE: &str = "application/x-mpegURL";
pub const SEGMENT_CONTENT_TYPE: &str = "video/MP2T";
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// Logical role of a file produced by a transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Manifest,
    Segment,
    Binary,
}

impl ArtifactKind {
    pub fn from_file_name(name: &str) -> Self {
        if name.ends_with(MANIFEST_SUFFIX) {
            ArtifactKind::Manifest
        } else if name.ends_with(SEGMENT_SUFFIX) {
            ArtifactKind::Segment
        } else {
            ArtifactKind::Binary
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ArtifactKind::Manifest => MANIFEST_CONTENT_TYPE,
            ArtifactKind::Segment => SEGMENT_CONTENT_TYPE,
            ArtifactKind::Binary => BINARY_CONTENT_TYPE,
        }
    }

    pub fn cache_control(self) -> &'static str {
        match self {
            ArtifactKind::Manifest => "no-cache",
            ArtifactKind::Segment => "public, max-age=3600",
            ArtifactKind::Binary => "no-store",
        }
    }
}

/// Object key of an output artifact: `{video_id}/{file_name}`.
pub fn output_key(video_id: &str, file_name: &str) -> String {
    format!("{}/{}", video_id, file_name)
}
