pub mod rabbitmq;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::modules::video::events::TranscodeJob;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to settle delivery: {0}")]
    Settle(String),
}

/// One inbound message. Must be settled by exactly one of `ack` or `nack`;
/// both consume the delivery.
pub trait Delivery: Send {
    fn body(&self) -> &[u8];

    fn redelivered(&self) -> bool;

    fn ack(self: Box<Self>) -> BoxFuture<'static, Result<(), QueueError>>;

    fn nack(self: Box<Self>, requeue: bool) -> BoxFuture<'static, Result<(), QueueError>>;
}

pub type DeliveryStream = BoxStream<'static, Result<Box<dyn Delivery>, QueueError>>;

/// Durable, at-least-once channel carrying transcode requests.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn publish(&self, job: &TranscodeJob) -> Result<(), QueueError>;

    /// Open a fresh consumer. Calling it again after the stream ends resumes
    /// delivery on a new connection if needed.
    async fn consume(&self) -> Result<DeliveryStream, QueueError>;

    /// Ask the broker to stop delivering to this process.
    async fn stop_consuming(&self) -> Result<(), QueueError>;
}
