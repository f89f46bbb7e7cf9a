use crate::error::EmailSendError;

/// Provider acknowledgment for one accepted email.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentEmail {
    pub message_id: Option<String>,
}

/// Result of one send attempt during a fan-out.
#[derive(Debug, Clone)]
pub struct RecipientOutcome {
    pub email: String,
    pub result: Result<SentEmail, EmailSendError>,
}

/// Per-recipient results of a fan-out, in attendee order.
#[derive(Debug, Clone, Default)]
pub struct FanOutReport {
    pub outcomes: Vec<RecipientOutcome>,
    pub skipped: u32,
}

impl FanOutReport {
    pub fn attempted(&self) -> u32 {
        self.outcomes.len() as u32
    }

    pub fn delivered(&self) -> u32 {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count() as u32
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecipientOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

pub fn personalized_subject(first_name: &str, subject: &str) -> String {
    format!("{}: {}", first_name, subject)
}
