use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use chrono::{SecondsFormat, Utc};
use futures_util::StreamExt;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::{
    clients::{DeliveryBroker, StoreConnector, rbmq::RabbitMqClient},
    consumer::{Consumer, DispatchOutcome},
    error::DispatchResult,
    models::message::FailedMessage,
};

const CONSUMER_TAG: &str = "notification_worker";

/// How a delivery is settled with the broker once its invocation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryAction {
    Ack,
    Requeue,
    DeadLetter,
}

impl DeliveryAction {
    /// Store failures get one redelivery; anything else that failed is
    /// dead-lettered so it cannot loop on the queue.
    pub fn for_result(result: &DispatchResult<DispatchOutcome>, redelivered: bool) -> Self {
        match result {
            Ok(_) => DeliveryAction::Ack,
            Err(e) if e.is_retryable() && !redelivered => DeliveryAction::Requeue,
            Err(_) => DeliveryAction::DeadLetter,
        }
    }
}

pub async fn run_worker<S>(
    rabbitmq: Arc<RabbitMqClient>,
    consumer: Consumer<S>,
    concurrency: usize,
) -> Result<(), Error>
where
    S: StoreConnector + 'static,
{
    let mut deliveries = rabbitmq.create_consumer(CONSUMER_TAG).await?;
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));

    info!(concurrency, "Notification worker started");

    while let Some(delivery) = deliveries.next().await {
        let delivery = delivery.map_err(|e| anyhow!("Consumer stream failed: {}", e))?;
        let permit = Arc::clone(&permits).acquire_owned().await?;

        let rabbitmq = Arc::clone(&rabbitmq);
        let consumer = consumer.clone();

        tokio::spawn(async move {
            let _permit = permit;

            let result = consumer.handle_message(&delivery.data).await;
            let action = DeliveryAction::for_result(&result, delivery.redelivered);

            let reason = result.as_ref().err().map(ToString::to_string);
            if let Err(e) = settle(
                rabbitmq.as_ref(),
                delivery.delivery_tag,
                &delivery.data,
                action,
                reason,
            )
            .await
            {
                error!(
                    delivery_tag = delivery.delivery_tag,
                    error = %e,
                    "Failed to settle delivery"
                );
            }
        });
    }

    warn!("Notification queue consumer stream ended");

    Ok(())
}

/// Settles one delivery with the broker.
///
/// The delivery is always acked or rejected, even when the failed-queue
/// publish errors. In that case it goes back on the notification queue and
/// the publish error is returned.
pub async fn settle<B>(
    broker: &B,
    delivery_tag: u64,
    body: &[u8],
    action: DeliveryAction,
    reason: Option<String>,
) -> Result<(), Error>
where
    B: DeliveryBroker + ?Sized,
{
    match action {
        DeliveryAction::Ack => broker.acknowledge(delivery_tag).await,
        DeliveryAction::Requeue => {
            warn!(delivery_tag, "Requeueing message for redelivery");
            broker.reject(delivery_tag, true).await
        }
        DeliveryAction::DeadLetter => {
            let failed = FailedMessage {
                body: String::from_utf8_lossy(body).into_owned(),
                failure_reason: reason.unwrap_or_else(|| "unknown".to_string()),
                failed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            };

            warn!(
                delivery_tag,
                reason = %failed.failure_reason,
                "Moving message to failed queue"
            );

            if let Err(e) = broker.publish_failed(&failed).await {
                error!(
                    delivery_tag,
                    error = %e,
                    "Failed queue unavailable, returning message to notification queue"
                );
                broker.reject(delivery_tag, true).await?;
                return Err(e);
            }

            broker.reject(delivery_tag, false).await
        }
    }
}
