use serde::{Deserialize, Serialize};

use crate::{
    error::{DispatchError, DispatchResult},
    models::notification::NotificationId,
};

/// Queue payload: the decimal notification id as UTF-8 text.
///
/// Content is deliberately not carried; the consumer re-reads the
/// notification at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueMessage {
    pub notification_id: NotificationId,
}

impl QueueMessage {
    pub fn new(notification_id: NotificationId) -> Self {
        Self { notification_id }
    }

    pub fn payload(&self) -> String {
        self.notification_id.to_string()
    }

    pub fn decode(body: &[u8]) -> DispatchResult<Self> {
        let text = std::str::from_utf8(body)
            .map_err(|_| DispatchError::MalformedMessage("body is not valid UTF-8".to_string()))?;

        let notification_id = text.trim().parse::<NotificationId>().map_err(|_| {
            DispatchError::MalformedMessage(format!("{:?} is not a notification id", text))
        })?;

        Ok(Self { notification_id })
    }
}

/// Record published to the failed-message queue when a delivery is dead-lettered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedMessage {
    pub body: String,
    pub failure_reason: String,
    pub failed_at: String,
}
