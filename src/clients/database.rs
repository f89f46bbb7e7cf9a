use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info, warn};

use crate::{
    clients::{ConferenceStore, StoreConnector},
    config::Config,
    error::{DispatchError, DispatchResult},
    models::{
        attendee::{Attendee, NewAttendee},
        notification::{NewNotification, Notification, NotificationId},
        status::NotificationStatus,
    },
};

const NOTIFICATION_COLUMNS: &str =
    "id, subject, message, status, submitted_date, completed_date";

const ATTENDEE_COLUMNS: &str = "id, first_name, last_name, email, job_position, company, city, \
     state, interests, comments, conference_id, submitted_date";

/// Opens one Postgres connection per session.
pub struct PostgresStore {
    config: tokio_postgres::Config,
}

impl PostgresStore {
    pub fn new(config: &Config) -> Self {
        info!(
            host = %config.postgres_url,
            database = %config.postgres_db,
            "PostgreSQL store configured"
        );

        Self {
            config: config.postgres_config(),
        }
    }

    pub fn from_pg_config(config: tokio_postgres::Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreConnector for PostgresStore {
    type Session = PostgresSession;

    async fn open(&self) -> DispatchResult<PostgresSession> {
        let (client, connection) = self.config.connect(NoTls).await.map_err(|e| {
            error!(error = %e, "Failed to connect to PostgreSQL");
            DispatchError::from(e)
        })?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "PostgreSQL connection terminated with error");
            }
        });

        debug!("PostgreSQL session opened");

        Ok(PostgresSession { client, driver })
    }
}

pub struct PostgresSession {
    client: Client,
    driver: JoinHandle<()>,
}

#[async_trait]
impl ConferenceStore for PostgresSession {
    async fn create_notification(
        &mut self,
        notification: &NewNotification,
        submitted_date: DateTime<Utc>,
    ) -> DispatchResult<Notification> {
        let status = NotificationStatus::Submitted.to_string();

        let row = self
            .client
            .query_one(
                &format!(
                    "INSERT INTO notification (subject, message, status, submitted_date) \
                     VALUES ($1, $2, $3, $4) RETURNING {}",
                    NOTIFICATION_COLUMNS
                ),
                &[
                    &notification.subject,
                    &notification.message,
                    &status,
                    &submitted_date,
                ],
            )
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to insert notification");
                DispatchError::from(e)
            })?;

        notification_from_row(&row)
    }

    async fn find_notification(
        &mut self,
        id: NotificationId,
    ) -> DispatchResult<Option<Notification>> {
        let row = self
            .client
            .query_opt(
                &format!(
                    "SELECT {} FROM notification WHERE id = $1",
                    NOTIFICATION_COLUMNS
                ),
                &[&id.get()],
            )
            .await?;

        row.as_ref().map(notification_from_row).transpose()
    }

    async fn list_notifications(&mut self) -> DispatchResult<Vec<Notification>> {
        let rows = self
            .client
            .query(
                &format!(
                    "SELECT {} FROM notification ORDER BY id",
                    NOTIFICATION_COLUMNS
                ),
                &[],
            )
            .await?;

        rows.iter().map(notification_from_row).collect()
    }

    async fn set_status(
        &mut self,
        id: NotificationId,
        status: &NotificationStatus,
    ) -> DispatchResult<()> {
        status.check_write(false)?;
        let status = status.to_string();

        self.client
            .execute(
                "UPDATE notification SET status = $1 WHERE id = $2",
                &[&status, &id.get()],
            )
            .await?;

        debug!(notification_id = %id, status = %status, "Notification status written");

        Ok(())
    }

    async fn complete(
        &mut self,
        id: NotificationId,
        status: &NotificationStatus,
        completed_date: DateTime<Utc>,
    ) -> DispatchResult<()> {
        status.check_write(true)?;
        let status = status.to_string();

        // Dropping the transaction on an early return rolls it back.
        let transaction = self.client.transaction().await?;
        transaction
            .execute(
                "UPDATE notification SET status = $1, completed_date = $2 WHERE id = $3",
                &[&status, &completed_date, &id.get()],
            )
            .await?;
        transaction.commit().await?;

        debug!(notification_id = %id, status = %status, "Notification completion committed");

        Ok(())
    }

    async fn list_attendees(&mut self) -> DispatchResult<Vec<Attendee>> {
        let rows = self
            .client
            .query(
                &format!(
                    "SELECT {} FROM attendee ORDER BY submitted_date, id",
                    ATTENDEE_COLUMNS
                ),
                &[],
            )
            .await?;

        rows.iter().map(attendee_from_row).collect()
    }

    async fn register_attendee(
        &mut self,
        attendee: &NewAttendee,
        conference_id: i32,
        submitted_date: DateTime<Utc>,
    ) -> DispatchResult<Attendee> {
        let row = self
            .client
            .query_one(
                &format!(
                    "INSERT INTO attendee (first_name, last_name, email, job_position, company, \
                     city, state, interests, comments, conference_id, submitted_date) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
                    ATTENDEE_COLUMNS
                ),
                &[
                    &attendee.first_name,
                    &attendee.last_name,
                    &attendee.email,
                    &attendee.job_position,
                    &attendee.company,
                    &attendee.city,
                    &attendee.state,
                    &attendee.interests,
                    &attendee.comments,
                    &conference_id,
                    &submitted_date,
                ],
            )
            .await
            .map_err(|e| {
                error!(error = %e, email = %attendee.email, "Failed to insert attendee");
                DispatchError::from(e)
            })?;

        attendee_from_row(&row)
    }

    async fn ping(&mut self) -> DispatchResult<()> {
        self.client.simple_query("SELECT 1").await?;
        Ok(())
    }

    async fn close(self) {
        let PostgresSession { client, driver } = self;
        drop(client);

        if let Err(e) = driver.await {
            warn!(error = %e, "PostgreSQL connection task did not shut down cleanly");
        }

        debug!("PostgreSQL session closed");
    }
}

fn notification_from_row(row: &Row) -> DispatchResult<Notification> {
    let status: String = row.try_get("status")?;

    Ok(Notification {
        id: NotificationId(row.try_get("id")?),
        subject: row.try_get("subject")?,
        message: row.try_get("message")?,
        status: NotificationStatus::from(status.as_str()),
        submitted_date: row.try_get("submitted_date")?,
        completed_date: row.try_get("completed_date")?,
    })
}

fn attendee_from_row(row: &Row) -> DispatchResult<Attendee> {
    Ok(Attendee {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get::<_, Option<String>>("email")?.unwrap_or_default(),
        job_position: row.try_get("job_position")?,
        company: row.try_get("company")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        interests: row.try_get("interests")?,
        comments: row.try_get("comments")?,
        conference_id: row.try_get("conference_id")?,
        submitted_date: row.try_get("submitted_date")?,
    })
}
