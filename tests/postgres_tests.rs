use std::sync::Arc;

use anyhow::Result;
use conference_notifier::{
    clients::{ConferenceStore, StoreConnector, database::PostgresStore},
    consumer::Consumer,
    models::{attendee::NewAttendee, status::NotificationStatus},
    producer::Producer,
};
use testcontainers::{
    ContainerAsync, GenericImage, ImageExt,
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
};

use crate::common::{RecordingQueue, RecordingSender};

const SCHEMA: &str = include_str!("../migrations/0001_create_conference_tables.sql");

async fn start_postgres() -> Result<(ContainerAsync<GenericImage>, PostgresStore)> {
    let container = GenericImage::new("postgres", "16-alpine")
        .with_exposed_port(5432.tcp())
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "techconfdb")
        .start()
        .await?;

    let host = container.get_host().await?.to_string();
    let port = container.get_host_port_ipv4(5432.tcp()).await?;

    let mut pg = tokio_postgres::Config::new();
    pg.host(&host)
        .port(port)
        .dbname("techconfdb")
        .user("postgres")
        .password("postgres");

    let store = PostgresStore::from_pg_config(pg.clone());

    let (client, connection) = pg.connect(tokio_postgres::NoTls).await?;
    let driver = tokio::spawn(connection);
    client.batch_execute(SCHEMA).await?;
    drop(client);
    let _ = driver.await;

    Ok((container, store))
}

fn attendee(first_name: &str, email: &str) -> NewAttendee {
    NewAttendee {
        first_name: first_name.to_string(),
        last_name: "Attendee".to_string(),
        email: email.to_string(),
        job_position: Some("Engineer".to_string()),
        company: None,
        city: Some("Lisbon".to_string()),
        state: None,
        interests: None,
        comments: None,
    }
}

/// Test: Submit, enqueue and dispatch against a real Postgres
#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_submit_and_dispatch() -> Result<()> {
    let (_container, store) = start_postgres().await?;
    let store = Arc::new(store);

    let mut session = store.open().await?;
    for (name, email) in [("Ann", "a@x.com"), ("Bo", "b@x.com")] {
        session
            .register_attendee(&attendee(name, email), 1, chrono::Utc::now())
            .await?;
    }
    session.close().await;

    let sender = RecordingSender::new();
    let queue = RecordingQueue::new();
    let consumer = Consumer::new(Arc::clone(&store), Arc::new(sender.clone()));
    let producer = Producer::new(Arc::clone(&store), consumer.clone())
        .with_queue(Arc::new(queue.clone()), "notificationqueue");

    let id = producer.submit("Welcome", "See you there").await?;

    let mut session = store.open().await?;
    let queued = session.find_notification(id).await?.expect("row exists");
    session.close().await;
    assert_eq!(queued.status, NotificationStatus::QueuedForProcessing);
    assert!(queued.completed_date.is_none());

    let (_, payload) = queue.pushed().pop().expect("message pushed");
    consumer.handle_message(payload.as_bytes()).await?;

    assert_eq!(
        sender.subjects(),
        vec!["Ann: Welcome".to_string(), "Bo: Welcome".to_string()]
    );

    let mut session = store.open().await?;
    let done = session.find_notification(id).await?.expect("row exists");
    let listed = session.list_notifications().await?;
    let refused = session
        .set_status(id, &NotificationStatus::Notified { attendees: 9 })
        .await;
    let unchanged = session.find_notification(id).await?.expect("row exists");
    session.close().await;

    assert!(refused.is_err(), "Notified status needs a completion date");
    assert_eq!(unchanged.status, done.status);

    assert_eq!(done.status.to_string(), "notified 2 attendees");
    assert!(done.completed_date.unwrap() >= done.submitted_date);
    assert_eq!(listed.len(), 1);

    Ok(())
}
