use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use super::dto::{CreateVideoRequest, UploadUrlResponse, VideoResponse};
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::middleware::auth::Caller;
use crate::state::AppState;

/// Register a video before its file is uploaded
#[utoipa::path(
    post,
    path = "/api/v1/videos",
    request_body = CreateVideoRequest,
    responses(
        (status = 201, description = "Video created", body = ApiResponse<VideoResponse>),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Missing user identity")
    ),
    params(("x-user-id" = String, Header, description = "Caller identity")),
    tag = "Video"
)]
pub async fn create_video(
    State(state): State<AppState>,
    Extension(Caller(user_id)): Extension<Caller>,
    Json(payload): Json<CreateVideoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Err(e) = payload.validate() {
        return Err(ApiError(e.to_string(), StatusCode::BAD_REQUEST));
    }

    let video = state.videos.create_video(payload.into_new_video(user_id)).await?;
    Ok(ApiSuccess(
        ApiResponse::success(VideoResponse::from(video), "Video created successfully"),
        StatusCode::CREATED,
    ))
}

/// Presigned URL for uploading the raw file straight to storage
#[utoipa::path(
    post,
    path = "/api/v1/videos/{id}/upload-url",
    params(
        ("id" = String, Path, description = "Video ID"),
        ("x-user-id" = String, Header, description = "Caller identity")
    ),
    responses(
        (status = 200, description = "Upload URL issued", body = ApiResponse<UploadUrlResponse>),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Video not found")
    ),
    tag = "Video"
)]
pub async fn upload_url(
    State(state): State<AppState>,
    Extension(Caller(user_id)): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let upload_url = state.videos.presign_upload(&user_id, &id).await?;
    let response = UploadUrlResponse {
        video_id: id,
        upload_url,
        expires_in_secs: state.videos.presign_ttl().as_secs(),
    };
    Ok(ApiSuccess(ApiResponse::success(response, "Upload URL generated"), StatusCode::OK))
}

/// Confirm the upload and queue the video for transcoding
#[utoipa::path(
    post,
    path = "/api/v1/videos/{id}/complete",
    params(
        ("id" = String, Path, description = "Video ID"),
        ("x-user-id" = String, Header, description = "Caller identity")
    ),
    responses(
        (status = 202, description = "Transcode job queued"),
        (status = 400, description = "Raw file not uploaded yet"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Video not found")
    ),
    tag = "Video"
)]
pub async fn complete_upload(
    State(state): State<AppState>,
    Extension(Caller(user_id)): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.videos.complete_upload(&user_id, &id).await?;
    Ok(ApiSuccess(
        ApiResponse::success(id, "Video queued for transcoding"),
        StatusCode::ACCEPTED,
    ))
}

/// Presigned URL for downloading the raw upload
#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}/source-url",
    params(
        ("id" = String, Path, description = "Video ID"),
        ("x-user-id" = String, Header, description = "Caller identity")
    ),
    responses(
        (status = 200, description = "Download URL issued", body = ApiResponse<String>),
        (status = 400, description = "Raw file not uploaded yet"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Video not found")
    ),
    tag = "Video"
)]
pub async fn source_url(
    State(state): State<AppState>,
    Extension(Caller(user_id)): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let url = state.videos.presign_download(&user_id, &id).await?;
    Ok(ApiSuccess(ApiResponse::success(url, "Download URL generated"), StatusCode::OK))
}
