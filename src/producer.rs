//! Enqueue path: persist a notification, then hand its id to the queue.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::{
    clients::{ConferenceStore, NotificationQueue, StoreConnector},
    consumer::Consumer,
    error::DispatchResult,
    models::{
        message::QueueMessage,
        notification::{NewNotification, NotificationId},
        status::NotificationStatus,
    },
};

struct QueueTarget {
    client: Arc<dyn NotificationQueue>,
    queue_name: String,
}

pub struct Producer<S: StoreConnector> {
    store: Arc<S>,
    consumer: Consumer<S>,
    queue: Option<QueueTarget>,
}

impl<S: StoreConnector> Producer<S> {
    /// A producer without a queue dispatches synchronously through `consumer`.
    pub fn new(store: Arc<S>, consumer: Consumer<S>) -> Self {
        Self {
            store,
            consumer,
            queue: None,
        }
    }

    pub fn with_queue(
        mut self,
        client: Arc<dyn NotificationQueue>,
        queue_name: impl Into<String>,
    ) -> Self {
        self.queue = Some(QueueTarget {
            client,
            queue_name: queue_name.into(),
        });
        self
    }

    pub fn is_queued(&self) -> bool {
        self.queue.is_some()
    }

    /// Creates a notification and routes it for dispatch.
    ///
    /// Only store failures are returned. A failed push is recorded as
    /// `failed to queue` and the id is still returned.
    pub async fn submit(&self, subject: &str, message: &str) -> DispatchResult<NotificationId> {
        let mut session = self.store.open().await?;
        let result = self.submit_in(&mut session, subject, message).await;
        session.close().await;

        result.inspect_err(|e| error!(error = %e, "Unable to save notification"))
    }

    async fn submit_in(
        &self,
        session: &mut S::Session,
        subject: &str,
        message: &str,
    ) -> DispatchResult<NotificationId> {
        let new_notification = NewNotification {
            subject: subject.to_string(),
            message: message.to_string(),
        };

        let notification = session
            .create_notification(&new_notification, Utc::now())
            .await?;
        let id = notification.id;

        info!(notification_id = %id, "Notification submitted");

        match &self.queue {
            Some(target) => {
                let payload = QueueMessage::new(id).payload();

                let status = match target.client.push(&target.queue_name, &payload).await {
                    Ok(()) => {
                        info!(notification_id = %id, queue = %target.queue_name, "Notification queued");
                        NotificationStatus::QueuedForProcessing
                    }
                    Err(e) => {
                        error!(
                            notification_id = %id,
                            queue = %target.queue_name,
                            error = %e,
                            "Failed to queue notification"
                        );
                        NotificationStatus::FailedToQueue
                    }
                };

                session.set_status(id, &status).await?;
            }
            None => {
                warn!(
                    notification_id = %id,
                    "Queue not configured, dispatching notification synchronously"
                );

                let report = self.consumer.notify_attendees(session, &notification).await?;
                let status = NotificationStatus::NotifiedSynchronously {
                    attendees: report.attempted(),
                };

                session.complete(id, &status, Utc::now()).await?;

                info!(
                    notification_id = %id,
                    attempted = report.attempted(),
                    delivered = report.delivered(),
                    "Notification dispatched synchronously"
                );
            }
        }

        Ok(id)
    }
}
