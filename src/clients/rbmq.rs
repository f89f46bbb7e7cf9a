use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
        BasicRejectOptions, ConfirmSelectOptions, QueueDeclareOptions,
    },
    publisher_confirm::Confirmation,
    types::FieldTable,
};
use tracing::{debug, info};

use crate::{
    clients::{DeliveryBroker, NotificationQueue},
    config::Config,
    error::{DispatchError, DispatchResult},
    models::message::FailedMessage,
};

pub struct RabbitMqClient {
    connection: Connection,
    channel: Channel,
    notification_queue_name: String,
    failed_queue_name: String,
}

impl RabbitMqClient {
    pub async fn connect(url: &str, config: &Config) -> Result<Self, Error> {
        info!("Connecting to RabbitMQ");

        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| anyhow!("RabbitMQ channel creation failed: {}", e))?;

        channel
            .basic_qos(config.prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to set up QoS: {}", e))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to enable publisher confirms: {}", e))?;

        for queue_name in [&config.notification_queue_name, &config.failed_queue_name] {
            channel
                .queue_declare(
                    queue_name,
                    QueueDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| anyhow!("Failed to declare queue {}: {}", queue_name, e))?;

            debug!(queue = %queue_name, "Queue declared");
        }

        info!(
            notification_queue = %config.notification_queue_name,
            failed_queue = %config.failed_queue_name,
            "RabbitMQ connection established"
        );

        Ok(Self {
            connection,
            channel,
            notification_queue_name: config.notification_queue_name.clone(),
            failed_queue_name: config.failed_queue_name.clone(),
        })
    }

    pub fn notification_queue_name(&self) -> &str {
        &self.notification_queue_name
    }

    /// True while both the connection and the publishing channel are open.
    pub fn is_connected(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    pub async fn create_consumer(&self, consumer_tag: &str) -> Result<Consumer, Error> {
        let consumer = self
            .channel
            .basic_consume(
                &self.notification_queue_name,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to create consumer: {}", e))?;

        info!(queue = %self.notification_queue_name, consumer_tag, "Consumer created for queue");

        Ok(consumer)
    }
}

/// Maps a publisher confirm onto the push contract. The channel runs in
/// confirm mode, so anything but an ack means the broker did not take the
/// message.
pub fn check_confirmation(queue_name: &str, confirmation: Confirmation) -> DispatchResult<()> {
    match confirmation {
        Confirmation::Ack(_) => Ok(()),
        Confirmation::Nack(_) => Err(DispatchError::QueuePush(format!(
            "Broker refused message for queue {}",
            queue_name
        ))),
        Confirmation::NotRequested => Err(DispatchError::QueuePush(format!(
            "Publish to queue {} was not confirmed",
            queue_name
        ))),
    }
}

#[async_trait]
impl DeliveryBroker for RabbitMqClient {
    async fn acknowledge(&self, delivery_tag: u64) -> Result<(), Error> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to acknowledge message: {}", e))?;

        Ok(())
    }

    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Error> {
        self.channel
            .basic_reject(delivery_tag, BasicRejectOptions { requeue })
            .await
            .map_err(|e| anyhow!("Failed to reject message: {}", e))?;

        Ok(())
    }

    async fn publish_failed(&self, message: &FailedMessage) -> Result<(), Error> {
        let payload = serde_json::to_vec(message)?;

        let confirmation = self
            .channel
            .basic_publish(
                "",
                &self.failed_queue_name,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_content_type("application/json".into()),
            )
            .await
            .map_err(|e| anyhow!("Failed to publish message to failed queue: {}", e))?
            .await
            .map_err(|e| anyhow!("Failed queue publish was not confirmed: {}", e))?;

        check_confirmation(&self.failed_queue_name, confirmation)?;

        Ok(())
    }
}

#[async_trait]
impl NotificationQueue for RabbitMqClient {
    async fn push(&self, queue_name: &str, payload: &str) -> DispatchResult<()> {
        let confirmation = self
            .channel
            .basic_publish(
                "",
                queue_name,
                BasicPublishOptions::default(),
                payload.as_bytes(),
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_content_type("text/plain".into()),
            )
            .await?
            .await?;

        check_confirmation(queue_name, confirmation)?;

        debug!(queue = %queue_name, payload, "Message published and confirmed");

        Ok(())
    }
}
