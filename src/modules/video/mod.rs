use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod events;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handler::create_video))
        .route("/{id}/upload-url", post(handler::upload_url))
        .route("/{id}/source-url", get(handler::source_url))
        .route("/{id}/complete", post(handler::complete_upload))
        .route_layer(middleware::from_fn(crate::middleware::auth::caller_middleware))
}
