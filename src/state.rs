use crate::modules::stream::service::StreamService;
use crate::modules::video::service::VideoService;

#[derive(Clone)]
pub struct AppState {
    pub videos: VideoService,
    pub stream: StreamService,
}

impl AppState {
    pub fn new(videos: VideoService, stream: StreamService) -> Self {
        Self { videos, stream }
    }
}
