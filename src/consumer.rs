//! Dispatch worker: turns one queue message into one email per attendee.

use std::sync::Arc;

use chrono::Utc;
use futures_util::{StreamExt, stream};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::{
    clients::{ConferenceStore, EmailSender, StoreConnector},
    error::{DispatchError, DispatchResult},
    models::{
        attendee::Attendee,
        email::{FanOutReport, RecipientOutcome, personalized_subject},
        message::QueueMessage,
        notification::{Notification, NotificationId},
        status::NotificationStatus,
    },
};

#[derive(Debug)]
pub enum DispatchOutcome {
    Notified {
        notification_id: NotificationId,
        status: NotificationStatus,
        report: FanOutReport,
    },
    /// The id did not resolve to a notification; nothing was written.
    NotificationMissing(NotificationId),
}

pub struct Consumer<S: StoreConnector> {
    store: Arc<S>,
    sender: Arc<dyn EmailSender>,
    send_concurrency: usize,
}

impl<S: StoreConnector> Clone for Consumer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            sender: Arc::clone(&self.sender),
            send_concurrency: self.send_concurrency,
        }
    }
}

impl<S: StoreConnector> Consumer<S> {
    pub fn new(store: Arc<S>, sender: Arc<dyn EmailSender>) -> Self {
        Self {
            store,
            sender,
            send_concurrency: 1,
        }
    }

    /// Sends up to `limit` emails at a time. Results keep attendee order.
    pub fn with_send_concurrency(mut self, limit: usize) -> Self {
        self.send_concurrency = limit.max(1);
        self
    }

    /// Handles one queue delivery.
    ///
    /// Fails only on an undecodable body or a store error; a missing
    /// notification and per-recipient send failures are absorbed.
    pub async fn handle_message(&self, body: &[u8]) -> DispatchResult<DispatchOutcome> {
        let message = QueueMessage::decode(body).inspect_err(|e| {
            error!(error = %e, "Rejecting undecodable queue message");
        })?;

        let span = info_span!(
            "dispatch",
            invocation_id = %Uuid::new_v4(),
            notification_id = %message.notification_id
        );

        self.dispatch(message.notification_id).instrument(span).await
    }

    pub async fn dispatch(&self, id: NotificationId) -> DispatchResult<DispatchOutcome> {
        info!(notification_id = %id, "Processing notification");

        let mut session = self.store.open().await?;
        let result = self.dispatch_in(&mut session, id).await;
        session.close().await;

        match result {
            Err(DispatchError::NotificationNotFound(id)) => {
                warn!(notification_id = %id, "Notification not found, nothing to dispatch");
                Ok(DispatchOutcome::NotificationMissing(id))
            }
            Err(e) => {
                error!(notification_id = %id, error = %e, "Dispatch failed");
                Err(e)
            }
            ok => ok,
        }
    }

    async fn dispatch_in(
        &self,
        session: &mut S::Session,
        id: NotificationId,
    ) -> DispatchResult<DispatchOutcome> {
        let notification = session
            .find_notification(id)
            .await?
            .ok_or(DispatchError::NotificationNotFound(id))?;

        let report = self.notify_attendees(session, &notification).await?;
        let status = NotificationStatus::Notified {
            attendees: report.delivered(),
        };

        session.complete(id, &status, Utc::now()).await?;

        info!(
            notification_id = %id,
            delivered = report.delivered(),
            failed = report.failures().count(),
            skipped = report.skipped,
            "Notification dispatched"
        );

        Ok(DispatchOutcome::Notified {
            notification_id: id,
            status,
            report,
        })
    }

    /// Loads every attendee and sends each a personalized copy of the notification.
    ///
    /// Returns once all sends have finished. Only the attendee load can fail.
    pub async fn notify_attendees(
        &self,
        session: &mut S::Session,
        notification: &Notification,
    ) -> DispatchResult<FanOutReport> {
        let attendees = session.list_attendees().await?;
        Ok(self.fan_out(notification, attendees).await)
    }

    async fn fan_out(&self, notification: &Notification, attendees: Vec<Attendee>) -> FanOutReport {
        let total = attendees.len();
        let recipients: Vec<Attendee> = attendees
            .into_iter()
            .filter(|attendee| {
                let deliverable = attendee.has_deliverable_email();
                if !deliverable {
                    warn!(attendee_id = attendee.id, "Skipping attendee without email address");
                }
                deliverable
            })
            .collect();

        let skipped = (total - recipients.len()) as u32;
        let sends: Vec<_> = recipients
            .iter()
            .map(|attendee| self.send_to(attendee, notification))
            .collect();
        let outcomes = stream::iter(sends)
            .buffered(self.send_concurrency)
            .collect()
            .await;

        FanOutReport { outcomes, skipped }
    }

    async fn send_to(&self, attendee: &Attendee, notification: &Notification) -> RecipientOutcome {
        let subject = personalized_subject(&attendee.first_name, &notification.subject);
        let result = self
            .sender
            .send(&attendee.email, &subject, &notification.message)
            .await;

        match &result {
            Ok(sent) => debug!(
                attendee_email = %attendee.email,
                message_id = ?sent.message_id,
                sender = self.sender.name(),
                "Email sent"
            ),
            Err(e) => error!(
                attendee_email = %attendee.email,
                error = %e,
                "Failed to send email"
            ),
        }

        RecipientOutcome {
            email: attendee.email.clone(),
            result,
        }
    }
}
