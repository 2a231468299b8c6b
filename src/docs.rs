use utoipa::OpenApi;
use crate::common::response::ApiResponse;
use crate::modules::stream::dto::StreamInfo;
use crate::modules::video::dto::{CreateVideoRequest, UploadUrlResponse, VideoResponse};
use crate::modules::video::model::VideoStatus;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::video::handler::create_video,
        crate::modules::video::handler::upload_url,
        crate::modules::video::handler::source_url,
        crate::modules::video::handler::complete_upload,
        crate::modules::stream::handler::stream_video,
        crate::modules::stream::handler::stream_file,
    ),
    components(
        schemas(
            CreateVideoRequest, VideoResponse, UploadUrlResponse, VideoStatus, StreamInfo,
            ApiResponse<StreamInfo>,
        )
    ),
    tags(
        (name = "Video", description = "Video registration and upload"),
        (name = "Stream", description = "HLS streaming proxy")
    )
)]
pub struct ApiDoc;
