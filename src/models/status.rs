use std::fmt::{Display, Formatter, Result};

use serde::{Serialize, Serializer};

use crate::error::{DispatchError, DispatchResult};

/// Lifecycle state of a notification, persisted as free-form text.
///
/// `completed_date` is written exactly when a notification enters one of the
/// two `Notified*` states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationStatus {
    Submitted,
    QueuedForProcessing,
    FailedToQueue,
    Notified { attendees: u32 },
    NotifiedSynchronously { attendees: u32 },
    /// Text written by something other than this service.
    Unrecognized(String),
}

impl NotificationStatus {
    pub fn marks_completion(&self) -> bool {
        matches!(
            self,
            NotificationStatus::Notified { .. } | NotificationStatus::NotifiedSynchronously { .. }
        )
    }

    /// Refuses a status write that would set `completed_date` without a
    /// `Notified*` status, or a `Notified*` status without it.
    pub fn check_write(&self, sets_completed_date: bool) -> DispatchResult<()> {
        match (self.marks_completion(), sets_completed_date) {
            (true, false) => Err(DispatchError::Persistence(format!(
                "status '{}' must be written with a completion date",
                self
            ))),
            (false, true) => Err(DispatchError::Persistence(format!(
                "status '{}' cannot carry a completion date",
                self
            ))),
            _ => Ok(()),
        }
    }
}

impl Display for NotificationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            NotificationStatus::Submitted => write!(f, "submitted"),
            NotificationStatus::QueuedForProcessing => write!(f, "queued for processing"),
            NotificationStatus::FailedToQueue => write!(f, "failed to queue"),
            NotificationStatus::Notified { attendees } => {
                write!(f, "notified {} attendees", attendees)
            }
            NotificationStatus::NotifiedSynchronously { attendees } => {
                write!(f, "notified {} attendees (synchronous)", attendees)
            }
            NotificationStatus::Unrecognized(text) => write!(f, "{}", text),
        }
    }
}

impl From<&str> for NotificationStatus {
    fn from(text: &str) -> Self {
        let normalized = text.trim().to_lowercase();

        match normalized.as_str() {
            "submitted" => return NotificationStatus::Submitted,
            "queued for processing" => return NotificationStatus::QueuedForProcessing,
            "failed to queue" => return NotificationStatus::FailedToQueue,
            _ => {}
        }

        if let Some(rest) = normalized.strip_prefix("notified ") {
            if let Some(count) = rest.strip_suffix(" attendees (synchronous)") {
                if let Ok(attendees) = count.parse() {
                    return NotificationStatus::NotifiedSynchronously { attendees };
                }
            } else if let Some(count) = rest.strip_suffix(" attendees") {
                if let Ok(attendees) = count.parse() {
                    return NotificationStatus::Notified { attendees };
                }
            }
        }

        NotificationStatus::Unrecognized(text.to_string())
    }
}

impl Serialize for NotificationStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
