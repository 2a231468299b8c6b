pub mod stream;
pub mod video;
