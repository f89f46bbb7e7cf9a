use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Attendee {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub job_position: Option<String>,
    pub company: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub interests: Option<String>,
    pub comments: Option<String>,
    pub conference_id: i32,
    pub submitted_date: DateTime<Utc>,
}

impl Attendee {
    /// Attendees without an address are never sent to.
    pub fn has_deliverable_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAttendee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,

    #[serde(default)]
    pub job_position: Option<String>,

    #[serde(default)]
    pub company: Option<String>,

    #[serde(default)]
    pub city: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub interests: Option<String>,

    #[serde(default)]
    pub comments: Option<String>,
}
