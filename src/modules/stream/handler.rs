use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::TryStreamExt;

use super::dto::StreamQuery;
use super::service::StreamError;
use crate::common::media::{ArtifactKind, MANIFEST_FILE};
use crate::common::response::{ApiResponse, ApiSuccess};
use crate::state::AppState;

fn manifest_response(body: String) -> Response {
    let kind = ArtifactKind::Manifest;
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, kind.content_type())
        .header(header::CACHE_CONTROL, kind.cache_control())
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Rewritten manifest of a ready video, or its info document with `?info=true`
#[utoipa::path(
    get,
    path = "/stream/{video_id}",
    params(
        ("video_id" = String, Path, description = "Video ID"),
        StreamQuery
    ),
    responses(
        (status = 200, description = "HLS manifest, or the info document with `?info=true`"),
        (status = 400, description = "Malformed path"),
        (status = 404, description = "Unknown video"),
        (status = 503, description = "Video not ready")
    ),
    tag = "Stream"
)]
pub async fn stream_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, StreamError> {
    if query.wants_info() {
        let info = state.stream.info(&video_id).await?;
        return Ok(
            ApiSuccess(ApiResponse::success(info, "Stream info retrieved successfully"), StatusCode::OK)
                .into_response(),
        );
    }

    let manifest = state.stream.manifest(&video_id, MANIFEST_FILE).await?;
    Ok(manifest_response(manifest))
}

/// Any other path under the proxy.
pub async fn invalid_path() -> StreamError {
    StreamError::BadRequest
}

/// Manifest or segment of a ready video
#[utoipa::path(
    get,
    path = "/stream/{video_id}/{file_name}",
    params(
        ("video_id" = String, Path, description = "Video ID"),
        ("file_name" = String, Path, description = "index.m3u8 or a segment such as segment_000.ts")
    ),
    responses(
        (status = 200, description = "Manifest or segment bytes"),
        (status = 400, description = "Malformed path"),
        (status = 404, description = "Unknown video or object"),
        (status = 503, description = "Video not ready")
    ),
    tag = "Stream"
)]
pub async fn stream_file(
    State(state): State<AppState>,
    Path((video_id, file_name)): Path<(String, String)>,
) -> Result<Response, StreamError> {
    match ArtifactKind::from_file_name(&file_name) {
        ArtifactKind::Manifest => {
            let manifest = state.stream.manifest(&video_id, &file_name).await?;
            Ok(manifest_response(manifest))
        }
        ArtifactKind::Segment => {
            let object = state.stream.segment(&video_id, &file_name).await?;
            let kind = ArtifactKind::Segment;

            let body = object.body.inspect_err(move |e| {
                tracing::warn!(video_id = %video_id, file_name = %file_name, "Stream interrupted: {}", e);
            });

            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, kind.content_type())
                .header(header::CACHE_CONTROL, kind.cache_control())
                .header(header::CONTENT_LENGTH, object.size)
                .body(Body::from_stream(body))
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR.into_response()))
        }
        ArtifactKind::Binary => Err(StreamError::BadRequest),
    }
}
