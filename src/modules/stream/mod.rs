use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod handler;
pub mod manifest;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{video_id}", get(handler::stream_video))
        .route("/{video_id}/{file_name}", get(handler::stream_file))
        .fallback(handler::invalid_path)
}
