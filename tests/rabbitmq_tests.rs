use std::time::Duration;

use anyhow::{Result, anyhow};
use conference_notifier::{
    clients::{DeliveryBroker, NotificationQueue, rbmq::RabbitMqClient},
    config::Config,
    models::{
        message::{FailedMessage, QueueMessage},
        notification::NotificationId,
    },
    worker::{DeliveryAction, settle},
};
use futures_util::StreamExt;
use lapin::{Consumer, message::Delivery};
use testcontainers::{
    ContainerAsync, GenericImage,
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
};

async fn start_rabbitmq() -> Result<(ContainerAsync<GenericImage>, String)> {
    let container = GenericImage::new("rabbitmq", "3.13-alpine")
        .with_exposed_port(5672.tcp())
        .with_wait_for(WaitFor::message_on_stdout("Server startup complete"))
        .start()
        .await?;

    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(5672.tcp()).await?;

    Ok((container, format!("amqp://guest:guest@{}:{}/%2f", host, port)))
}

async fn next_delivery(consumer: &mut Consumer) -> Result<Delivery> {
    let delivery = tokio::time::timeout(Duration::from_secs(10), consumer.next())
        .await?
        .ok_or_else(|| anyhow!("consumer stream ended"))??;

    Ok(delivery)
}

/// Test: A confirmed push is delivered to the notification queue consumer
#[tokio::test]
#[ignore = "requires Docker"]
async fn test_push_is_confirmed_and_consumed() -> Result<()> {
    let (_container, url) = start_rabbitmq().await?;
    let config = Config::from_vars(Vec::<(String, String)>::new())?;

    let rabbitmq = RabbitMqClient::connect(&url, &config).await?;
    assert!(rabbitmq.is_connected());

    rabbitmq
        .push(&config.notification_queue_name, &QueueMessage::new(NotificationId(42)).payload())
        .await?;

    let mut consumer = rabbitmq.create_consumer("test_consumer").await?;
    let delivery = next_delivery(&mut consumer).await?;

    let message = QueueMessage::decode(&delivery.data)?;
    assert_eq!(message.notification_id, NotificationId(42));
    rabbitmq.acknowledge(delivery.delivery_tag).await?;

    Ok(())
}

/// Test: Dead-lettered deliveries land on the failed queue and leave the main queue
#[tokio::test]
#[ignore = "requires Docker"]
async fn test_dead_letter_moves_message_to_failed_queue() -> Result<()> {
    let (_container, url) = start_rabbitmq().await?;
    let config = Config::from_vars(Vec::<(String, String)>::new())?;

    let rabbitmq = RabbitMqClient::connect(&url, &config).await?;
    rabbitmq.push(&config.notification_queue_name, "abc").await?;

    let mut consumer = rabbitmq.create_consumer("test_consumer").await?;
    let delivery = next_delivery(&mut consumer).await?;

    settle(
        &rabbitmq,
        delivery.delivery_tag,
        &delivery.data,
        DeliveryAction::DeadLetter,
        Some("Malformed queue message: abc".to_string()),
    )
    .await?;

    let mut failed_config = config.clone();
    failed_config.notification_queue_name = config.failed_queue_name.clone();
    let failed_reader = RabbitMqClient::connect(&url, &failed_config).await?;
    let mut failed_consumer = failed_reader.create_consumer("test_failed_consumer").await?;

    let failed_delivery = next_delivery(&mut failed_consumer).await?;
    let failed: FailedMessage = serde_json::from_slice(&failed_delivery.data)?;

    assert_eq!(failed.body, "abc");
    assert_eq!(failed.failure_reason, "Malformed queue message: abc");
    failed_reader.acknowledge(failed_delivery.delivery_tag).await?;

    Ok(())
}
