use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::modules::video::service::VideoError;

#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T, message: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            status: "error".to_string(),
            message: message.to_string(),
            data: None,
        }
    }
}

pub struct ApiSuccess<T>(pub T, pub StatusCode);

impl<T> IntoResponse for ApiSuccess<ApiResponse<T>>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        let (response, status) = (self.0, self.1);
        (status, Json(response)).into_response()
    }
}

pub struct ApiError(pub String, pub StatusCode);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (message, status) = (self.0, self.1);
        let response = ApiResponse::<()>::error(&message);
        (status, Json(response)).into_response()
    }
}

/// Client-facing errors never carry storage, broker or database detail.
impl From<VideoError> for ApiError {
    fn from(err: VideoError) -> Self {
        match err {
            VideoError::NotFound(_) => ApiError("Video not found".to_string(), StatusCode::NOT_FOUND),
            VideoError::Forbidden => ApiError(err.to_string(), StatusCode::FORBIDDEN),
            VideoError::SourceMissing(_) => ApiError(
                "Video file not found in storage (did you upload it?)".to_string(),
                StatusCode::BAD_REQUEST,
            ),
            VideoError::Status(_) | VideoError::Contended(_) => ApiError(err.to_string(), StatusCode::CONFLICT),
            VideoError::Store(_) | VideoError::Storage(_) | VideoError::Queue(_) => {
                error!(error = %err, "request failed");
                ApiError("Internal server error".to_string(), StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
