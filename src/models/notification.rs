use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::status::NotificationStatus;

/// Store-assigned notification identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub i32);

impl NotificationId {
    pub fn get(self) -> i32 {
        self.0
    }
}

impl Display for NotificationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NotificationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(NotificationId)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub subject: String,
    pub message: String,
    pub status: NotificationStatus,
    pub submitted_date: DateTime<Utc>,
    pub completed_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewNotification {
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmittedNotification {
    pub id: NotificationId,
}
