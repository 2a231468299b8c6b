//! Rewriting of stored HLS manifests so every segment fetch goes back
//! through the proxy.

use std::borrow::Cow;

use futures_util::TryStreamExt;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use crate::common::media::{DIRECTIVE_PREFIX, SEGMENT_SUFFIX};
use crate::infrastructure::storage::ByteStream;

/// Segment references become `{proxy_base}/{video_id}/{segment}`; directives
/// and every other line pass through untouched.
pub fn rewrite_line<'a>(line: &'a str, proxy_base: &str, video_id: &str) -> Cow<'a, str> {
    if !line.starts_with(DIRECTIVE_PREFIX) && line.ends_with(SEGMENT_SUFFIX) {
        Cow::Owned(format!("{}/{}/{}", proxy_base, video_id, line))
    } else {
        Cow::Borrowed(line)
    }
}

/// Read a stored manifest line by line, rewriting as it goes.
pub async fn read_rewritten(body: ByteStream, proxy_base: &str, video_id: &str) -> std::io::Result<String> {
    let reader = StreamReader::new(body.map_err(std::io::Error::other));
    let mut lines = reader.lines();

    let mut out = String::new();
    while let Some(line) = lines.next_line().await? {
        out.push_str(&rewrite_line(&line, proxy_base, video_id));
        out.push('\n');
    }
    Ok(out)
}
