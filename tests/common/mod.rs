#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conference_notifier::{
    clients::{ConferenceStore, EmailSender, NotificationQueue, StoreConnector},
    error::{DispatchError, DispatchResult, EmailSendError},
    models::{
        attendee::{Attendee, NewAttendee},
        email::SentEmail,
        notification::{NewNotification, Notification, NotificationId},
        status::NotificationStatus,
    },
};

#[derive(Default)]
struct StoreState {
    notifications: BTreeMap<i32, Notification>,
    attendees: Vec<Attendee>,
    next_notification_id: i32,
    fail_open: bool,
    fail_create: bool,
    fail_attendees: bool,
    fail_writes: bool,
    open_sessions: usize,
    sessions_opened: usize,
    writes: usize,
}

/// In-memory store with failure switches and session accounting.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_notification(&self, id: i32, subject: &str, message: &str) -> Notification {
        let notification = Notification {
            id: NotificationId(id),
            subject: subject.to_string(),
            message: message.to_string(),
            status: NotificationStatus::QueuedForProcessing,
            submitted_date: Utc::now(),
            completed_date: None,
        };

        let mut state = self.state.lock().unwrap();
        state.next_notification_id = state.next_notification_id.max(id);
        state.notifications.insert(id, notification.clone());
        notification
    }

    pub fn add_attendee(&self, first_name: &str, email: &str) {
        let mut state = self.state.lock().unwrap();
        let id = state.attendees.len() as i32 + 1;
        state.attendees.push(Attendee {
            id,
            first_name: first_name.to_string(),
            last_name: "Attendee".to_string(),
            email: email.to_string(),
            job_position: None,
            company: None,
            city: None,
            state: None,
            interests: None,
            comments: None,
            conference_id: 1,
            submitted_date: Utc::now(),
        });
    }

    /// Edits a notification behind the dispatcher's back.
    pub fn edit_notification(&self, id: i32, edit: impl FnOnce(&mut Notification)) {
        let mut state = self.state.lock().unwrap();
        if let Some(notification) = state.notifications.get_mut(&id) {
            edit(notification);
        }
    }

    pub fn notification(&self, id: NotificationId) -> Option<Notification> {
        self.state.lock().unwrap().notifications.get(&id.get()).cloned()
    }

    pub fn notification_count(&self) -> usize {
        self.state.lock().unwrap().notifications.len()
    }

    pub fn fail_open(&self) {
        self.state.lock().unwrap().fail_open = true;
    }

    pub fn fail_create(&self) {
        self.state.lock().unwrap().fail_create = true;
    }

    pub fn fail_attendees(&self) {
        self.state.lock().unwrap().fail_attendees = true;
    }

    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }

    pub fn open_sessions(&self) -> usize {
        self.state.lock().unwrap().open_sessions
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.lock().unwrap().sessions_opened
    }

    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }
}

#[async_trait]
impl StoreConnector for MemoryStore {
    type Session = MemorySession;

    async fn open(&self) -> DispatchResult<MemorySession> {
        let mut state = self.state.lock().unwrap();
        if state.fail_open {
            return Err(DispatchError::Persistence("connection refused".to_string()));
        }

        state.open_sessions += 1;
        state.sessions_opened += 1;

        Ok(MemorySession {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MemorySession {
    state: Arc<Mutex<StoreState>>,
}

impl MemorySession {
    fn write_notification(
        &self,
        id: NotificationId,
        status: &NotificationStatus,
        completed_date: Option<DateTime<Utc>>,
    ) -> DispatchResult<()> {
        status.check_write(completed_date.is_some())?;

        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(DispatchError::Persistence("write rejected".to_string()));
        }

        if let Some(notification) = state.notifications.get_mut(&id.get()) {
            notification.status = status.clone();
            if completed_date.is_some() {
                notification.completed_date = completed_date;
            }
        }
        state.writes += 1;

        Ok(())
    }
}

#[async_trait]
impl ConferenceStore for MemorySession {
    async fn create_notification(
        &mut self,
        notification: &NewNotification,
        submitted_date: DateTime<Utc>,
    ) -> DispatchResult<Notification> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            return Err(DispatchError::Persistence("insert rejected".to_string()));
        }

        state.next_notification_id += 1;
        let created = Notification {
            id: NotificationId(state.next_notification_id),
            subject: notification.subject.clone(),
            message: notification.message.clone(),
            status: NotificationStatus::Submitted,
            submitted_date,
            completed_date: None,
        };
        state.notifications.insert(created.id.get(), created.clone());
        state.writes += 1;

        Ok(created)
    }

    async fn find_notification(
        &mut self,
        id: NotificationId,
    ) -> DispatchResult<Option<Notification>> {
        Ok(self.state.lock().unwrap().notifications.get(&id.get()).cloned())
    }

    async fn list_notifications(&mut self) -> DispatchResult<Vec<Notification>> {
        Ok(self.state.lock().unwrap().notifications.values().cloned().collect())
    }

    async fn set_status(
        &mut self,
        id: NotificationId,
        status: &NotificationStatus,
    ) -> DispatchResult<()> {
        self.write_notification(id, status, None)
    }

    async fn complete(
        &mut self,
        id: NotificationId,
        status: &NotificationStatus,
        completed_date: DateTime<Utc>,
    ) -> DispatchResult<()> {
        self.write_notification(id, status, Some(completed_date))
    }

    async fn list_attendees(&mut self) -> DispatchResult<Vec<Attendee>> {
        let state = self.state.lock().unwrap();
        if state.fail_attendees {
            return Err(DispatchError::Persistence("attendee query failed".to_string()));
        }

        Ok(state.attendees.clone())
    }

    async fn register_attendee(
        &mut self,
        attendee: &NewAttendee,
        conference_id: i32,
        submitted_date: DateTime<Utc>,
    ) -> DispatchResult<Attendee> {
        let mut state = self.state.lock().unwrap();
        let registered = Attendee {
            id: state.attendees.len() as i32 + 1,
            first_name: attendee.first_name.clone(),
            last_name: attendee.last_name.clone(),
            email: attendee.email.clone(),
            job_position: attendee.job_position.clone(),
            company: attendee.company.clone(),
            city: attendee.city.clone(),
            state: attendee.state.clone(),
            interests: attendee.interests.clone(),
            comments: attendee.comments.clone(),
            conference_id,
            submitted_date,
        };
        state.attendees.push(registered.clone());
        state.writes += 1;

        Ok(registered)
    }

    async fn ping(&mut self) -> DispatchResult<()> {
        Ok(())
    }

    async fn close(self) {
        self.state.lock().unwrap().open_sessions -= 1;
    }
}

/// Records every send; addresses in `failing` return a transport error.
#[derive(Clone, Default)]
pub struct RecordingSender {
    sent: Arc<Mutex<Vec<(String, String, String)>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, email: &str) {
        self.failing.lock().unwrap().insert(email.to_string());
    }

    /// Every attempted send as (to, subject, body).
    pub fn attempts(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.attempts().into_iter().map(|(_, subject, _)| subject).collect()
    }
}

#[async_trait]
impl EmailSender for RecordingSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<SentEmail, EmailSendError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));

        if self.failing.lock().unwrap().contains(to) {
            return Err(EmailSendError::Transport(format!("mailbox {} unavailable", to)));
        }

        Ok(SentEmail {
            message_id: Some(format!("msg-{}", to)),
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Queue double that records pushes, or refuses them all.
#[derive(Clone, Default)]
pub struct RecordingQueue {
    pushed: Arc<Mutex<Vec<(String, String)>>>,
    unavailable: bool,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Every pushed message as (queue name, payload).
    pub fn pushed(&self) -> Vec<(String, String)> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationQueue for RecordingQueue {
    async fn push(&self, queue_name: &str, payload: &str) -> DispatchResult<()> {
        if self.unavailable {
            return Err(DispatchError::QueuePush("broker unreachable".to_string()));
        }

        self.pushed
            .lock()
            .unwrap()
            .push((queue_name.to_string(), payload.to_string()));

        Ok(())
    }
}
