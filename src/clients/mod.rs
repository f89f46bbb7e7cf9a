//! Contracts between the dispatch core and its collaborators.
//!
//! The producer and consumer only talk to the outside world through these
//! traits. Concrete implementations live in the submodules: Postgres for
//! the store, RabbitMQ for the queue and delivery settling, SendGrid (or a logging no-op) for email.

pub mod database;
pub mod email;
pub mod health;
pub mod rbmq;

use anyhow::Error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::{DispatchResult, EmailSendError},
    models::{
        attendee::{Attendee, NewAttendee},
        email::SentEmail,
        message::FailedMessage,
        notification::{NewNotification, Notification, NotificationId},
        status::NotificationStatus,
    },
};

/// Opens store sessions.
///
/// A session is scoped to one producer request or one consumer invocation and
/// must be handed back through [`ConferenceStore::close`] on every exit path.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    type Session: ConferenceStore;

    async fn open(&self) -> DispatchResult<Self::Session>;
}

#[async_trait]
pub trait ConferenceStore: Send + Sync {
    /// Inserts a notification with status `submitted` and no completion date.
    async fn create_notification(
        &mut self,
        notification: &NewNotification,
        submitted_date: DateTime<Utc>,
    ) -> DispatchResult<Notification>;

    async fn find_notification(&mut self, id: NotificationId)
    -> DispatchResult<Option<Notification>>;

    async fn list_notifications(&mut self) -> DispatchResult<Vec<Notification>>;

    /// Writes a non-completing status, leaving `completed_date` untouched.
    ///
    /// Implementations refuse `Notified*` statuses here; those go through
    /// [`ConferenceStore::complete`].
    async fn set_status(
        &mut self,
        id: NotificationId,
        status: &NotificationStatus,
    ) -> DispatchResult<()>;

    /// Writes a `Notified*` status together with its completion date,
    /// atomically. Any other status is refused.
    async fn complete(
        &mut self,
        id: NotificationId,
        status: &NotificationStatus,
        completed_date: DateTime<Utc>,
    ) -> DispatchResult<()>;

    /// All attendees in stable order.
    async fn list_attendees(&mut self) -> DispatchResult<Vec<Attendee>>;

    async fn register_attendee(
        &mut self,
        attendee: &NewAttendee,
        conference_id: i32,
        submitted_date: DateTime<Utc>,
    ) -> DispatchResult<Attendee>;

    async fn ping(&mut self) -> DispatchResult<()>;

    /// Releases the underlying connection.
    async fn close(self);
}

#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Pushes a UTF-8 text payload onto the named queue.
    async fn push(&self, queue_name: &str, payload: &str) -> DispatchResult<()>;
}

/// Broker side of settling a consumed delivery.
#[async_trait]
pub trait DeliveryBroker: Send + Sync {
    async fn acknowledge(&self, delivery_tag: u64) -> Result<(), Error>;

    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Error>;

    /// Publishes to the failed queue and waits for the broker to confirm it.
    async fn publish_failed(&self, message: &FailedMessage) -> Result<(), Error>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<SentEmail, EmailSendError>;

    fn name(&self) -> &'static str;
}
