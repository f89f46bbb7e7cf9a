//! Error types for notification submission and dispatch.

use thiserror::Error;

use crate::models::notification::NotificationId;

pub type DispatchResult<T> = Result<T, DispatchError>;

/// Failures of a submit or dispatch operation as a whole.
///
/// Per-recipient email failures are not part of this enum; they are
/// reported through [`EmailSendError`] inside a fan-out report.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Any store read or write failure.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The notification id could not be pushed onto the queue.
    #[error("Failed to push to queue: {0}")]
    QueuePush(String),

    /// The queue message body is not a decimal notification id.
    #[error("Malformed queue message: {0}")]
    MalformedMessage(String),

    #[error("Notification {0} not found")]
    NotificationNotFound(NotificationId),
}

impl DispatchError {
    /// Whether a consumer invocation failing with this error should be redelivered.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Persistence(_))
    }
}

impl From<tokio_postgres::Error> for DispatchError {
    fn from(err: tokio_postgres::Error) -> Self {
        DispatchError::Persistence(err.to_string())
    }
}

impl From<lapin::Error> for DispatchError {
    fn from(err: lapin::Error) -> Self {
        DispatchError::QueuePush(err.to_string())
    }
}

/// Failure to deliver one email.
#[derive(Debug, Clone, Error)]
pub enum EmailSendError {
    #[error("Email transport error: {0}")]
    Transport(String),

    #[error("Email provider rejected message ({status}): {reason}")]
    Rejected { status: u16, reason: String },
}

impl From<reqwest::Error> for EmailSendError {
    fn from(err: reqwest::Error) -> Self {
        EmailSendError::Transport(err.to_string())
    }
}
