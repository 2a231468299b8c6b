use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt};
use lapin::{
    message::Delivery as AmqpMessage, options::*, types::FieldTable, BasicProperties, Channel,
    Connection, ConnectionProperties,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{Delivery, DeliveryStream, JobQueue, QueueError};
use crate::config::settings::QueueConfig;
use crate::modules::video::events::TranscodeJob;

/// One job in flight per consumer.
const PREFETCH: u16 = 1;

#[derive(Clone)]
pub struct RabbitMqService {
    config: QueueConfig,
    conn: Arc<Mutex<Connection>>,
    channel: Arc<Mutex<Channel>>,
}

impl RabbitMqService {
    async fn connect(config: &QueueConfig) -> Result<(Connection, Channel)> {
        info!("Connecting to RabbitMQ at {}", config.url);
        let conn = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| anyhow!("Failed to create channel: {}", e))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to enable publisher confirms: {}", e))?;

        channel
            .queue_declare(
                &config.queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare queue: {}", e))?;

        info!(queue = %config.queue_name, "Connected to RabbitMQ");
        Ok((conn, channel))
    }

    pub async fn new(config: QueueConfig) -> Result<Self> {
        let (conn, channel) = Self::connect(&config).await?;

        Ok(Self {
            config,
            conn: Arc::new(Mutex::new(conn)),
            channel: Arc::new(Mutex::new(channel)),
        })
    }

    async fn reconnect(&self) -> Result<()> {
        warn!("RabbitMQ connection dropped, reconnecting...");
        let (conn, channel) = Self::connect(&self.config).await?;
        *self.conn.lock().await = conn;
        *self.channel.lock().await = channel;
        Ok(())
    }

    async fn publish_internal(&self, payload: &[u8]) -> Result<()> {
        let channel = self.channel.lock().await;

        channel
            .basic_publish(
                "",
                &self.config.queue_name,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(2), // Persistent
            )
            .await
            .map_err(|e| anyhow!("Failed to publish message: {}", e))?
            .await
            .map_err(|e| anyhow!("Failed to confirm publication: {}", e))?;

        Ok(())
    }

    async fn consume_internal(&self) -> Result<lapin::Consumer> {
        let channel = self.channel.lock().await;

        channel
            .basic_qos(PREFETCH, BasicQosOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to set prefetch: {}", e))?;

        channel
            .basic_consume(
                &self.config.queue_name,
                &self.config.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to create consumer: {}", e))
    }

    pub async fn close(&self) {
        if let Err(e) = self.channel.lock().await.close(200, "shutdown").await {
            warn!("Failed to close RabbitMQ channel: {}", e);
        }
        if let Err(e) = self.conn.lock().await.close(200, "shutdown").await {
            warn!("Failed to close RabbitMQ connection: {}", e);
        }
    }
}

#[async_trait]
impl JobQueue for RabbitMqService {
    async fn publish(&self, job: &TranscodeJob) -> Result<(), QueueError> {
        let payload = serde_json::to_vec(job)?;

        if let Err(e) = self.publish_internal(&payload).await {
            warn!("RabbitMQ publish failed: {}. Retrying after reconnect.", e);
            self.reconnect()
                .await
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            self.publish_internal(&payload)
                .await
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        }

        Ok(())
    }

    async fn consume(&self) -> Result<DeliveryStream, QueueError> {
        let consumer = match self.consume_internal().await {
            Ok(consumer) => consumer,
            Err(e) => {
                warn!("RabbitMQ consume failed: {}. Retrying after reconnect.", e);
                self.reconnect()
                    .await
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                self.consume_internal()
                    .await
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?
            }
        };

        info!(queue = %self.config.queue_name, tag = %self.config.consumer_tag, "Consumer registered");

        let stream = consumer.map(|delivery| {
            delivery
                .map(|d| Box::new(AmqpDelivery(d)) as Box<dyn Delivery>)
                .map_err(|e| QueueError::Unavailable(e.to_string()))
        });

        Ok(stream.boxed())
    }

    async fn stop_consuming(&self) -> Result<(), QueueError> {
        self.channel
            .lock()
            .await
            .basic_cancel(&self.config.consumer_tag, BasicCancelOptions::default())
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))
    }
}

struct AmqpDelivery(AmqpMessage);

impl Delivery for AmqpDelivery {
    fn body(&self) -> &[u8] {
        &self.0.data
    }

    fn redelivered(&self) -> bool {
        self.0.redelivered
    }

    fn ack(self: Box<Self>) -> BoxFuture<'static, Result<(), QueueError>> {
        async move {
            self.0
                .ack(BasicAckOptions::default())
                .await
                .map(|_| ())
                .map_err(|e| QueueError::Settle(e.to_string()))
        }
        .boxed()
    }

    fn nack(self: Box<Self>, requeue: bool) -> BoxFuture<'static, Result<(), QueueError>> {
        async move {
            self.0
                .nack(BasicNackOptions {
                    requeue,
                    ..BasicNackOptions::default()
                })
                .await
                .map(|_| ())
                .map_err(|e| QueueError::Settle(e.to_string()))
        }
        .boxed()
    }
}
