use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use conference_notifier::{
    api::{AppState, run_api_server},
    clients::{
        database::PostgresStore, email::email_sender_from_config, health::HealthChecker,
        rbmq::RabbitMqClient,
    },
    config::{Config, ServiceRole},
    consumer::Consumer,
    producer::Producer,
    worker::run_worker,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(role = ?config.service_role, "Configuration validated");

    let store = Arc::new(PostgresStore::new(&config));
    let sender = email_sender_from_config(&config)?;
    let consumer = Consumer::new(Arc::clone(&store), sender)
        .with_send_concurrency(config.email_send_concurrency);

    let rabbitmq = match config.rabbitmq_url() {
        Some(url) => Some(Arc::new(RabbitMqClient::connect(url, &config).await?)),
        None => {
            warn!("RABBITMQ_URL not configured, notifications will be dispatched synchronously");
            None
        }
    };

    if config.service_role == ServiceRole::Worker && rabbitmq.is_none() {
        return Err(anyhow!("Worker role requires RABBITMQ_URL"));
    }

    let mut producer = Producer::new(Arc::clone(&store), consumer.clone());
    if let Some(client) = &rabbitmq {
        producer = producer.with_queue(client.clone(), config.notification_queue_name.clone());
    }

    let api = serve_api(&config, store, rabbitmq.clone(), producer);
    let worker = serve_worker(&config, rabbitmq, consumer);

    tokio::try_join!(api, worker)?;

    Ok(())
}

async fn serve_api(
    config: &Config,
    store: Arc<PostgresStore>,
    rabbitmq: Option<Arc<RabbitMqClient>>,
    producer: Producer<PostgresStore>,
) -> Result<(), Error> {
    if !config.runs_api() {
        return Ok(());
    }

    let health_checker = HealthChecker::new(Arc::clone(&store), rabbitmq);
    let state = Arc::new(AppState::new(
        store,
        producer,
        health_checker,
        config.conference_id,
    ));

    run_api_server(config.server_port, state).await
}

async fn serve_worker(
    config: &Config,
    rabbitmq: Option<Arc<RabbitMqClient>>,
    consumer: Consumer<PostgresStore>,
) -> Result<(), Error> {
    match rabbitmq {
        Some(client) if config.runs_worker() => {
            run_worker(client, consumer, config.worker_concurrency).await
        }
        _ => Ok(()),
    }
}
