use std::{collections::BTreeMap, sync::Arc, time::Instant};

use tracing::{debug, warn};

use crate::{
    clients::{ConferenceStore, StoreConnector, rbmq::RabbitMqClient},
    models::health::{ComponentHealth, DispatchMode, HealthReport},
};

/// Checks the store with a fresh session and the broker through the client
/// the service already holds.
pub struct HealthChecker<S: StoreConnector> {
    store: Arc<S>,
    rabbitmq: Option<Arc<RabbitMqClient>>,
}

impl<S: StoreConnector> HealthChecker<S> {
    pub fn new(store: Arc<S>, rabbitmq: Option<Arc<RabbitMqClient>>) -> Self {
        Self { store, rabbitmq }
    }

    pub async fn check_all(&self) -> HealthReport {
        let mut checks = BTreeMap::new();
        checks.insert("database", self.check_database().await);

        let dispatch = match &self.rabbitmq {
            Some(client) => {
                checks.insert("message_broker", check_message_broker(client));
                DispatchMode::Queued {
                    queue: client.notification_queue_name().to_string(),
                }
            }
            None => DispatchMode::Synchronous,
        };

        HealthReport::new(dispatch, checks)
    }

    async fn check_database(&self) -> ComponentHealth {
        let start = Instant::now();

        let mut session = match self.store.open().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Database connection failed");
                return ComponentHealth::down(format!("Connection failed: {}", e));
            }
        };

        let result = session.ping().await;
        session.close().await;

        match result {
            Ok(()) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "Database health check passed");
                ComponentHealth::up(Some(elapsed))
            }
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                ComponentHealth::down(format!("Health check query failed: {}", e))
            }
        }
    }
}

fn check_message_broker(client: &RabbitMqClient) -> ComponentHealth {
    if client.is_connected() {
        ComponentHealth::up(None)
    } else {
        warn!("RabbitMQ connection is closed");
        ComponentHealth::down("Connection closed".to_string())
    }
}
