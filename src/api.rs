use std::sync::Arc;

use anyhow::{Error, Result};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use chrono::Utc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
    clients::{ConferenceStore, StoreConnector, health::HealthChecker},
    models::{
        attendee::{Attendee, NewAttendee},
        health::HealthStatus,
        notification::{NewNotification, Notification, SubmittedNotification},
        response::ApiResponse,
        validation::{validate_email, validate_required},
    },
    producer::Producer,
};

pub struct AppState<S: StoreConnector> {
    store: Arc<S>,
    producer: Producer<S>,
    health_checker: HealthChecker<S>,
    conference_id: i32,
}

impl<S: StoreConnector> AppState<S> {
    pub fn new(
        store: Arc<S>,
        producer: Producer<S>,
        health_checker: HealthChecker<S>,
        conference_id: i32,
    ) -> Self {
        Self {
            store,
            producer,
            health_checker,
            conference_id,
        }
    }
}

pub fn router<S: StoreConnector + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/health", get(health_check::<S>))
        .route(
            "/notifications",
            get(list_notifications::<S>).post(submit_notification::<S>),
        )
        .route(
            "/attendees",
            get(list_attendees::<S>).post(register_attendee::<S>),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_api_server<S: StoreConnector + 'static>(
    port: u16,
    state: Arc<AppState<S>>,
) -> Result<(), Error> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "HTTP server started");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn health_check<S: StoreConnector>(State(state): State<Arc<AppState<S>>>) -> Response {
    let health = state.health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health)).into_response()
}

async fn submit_notification<S: StoreConnector>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<NewNotification>,
) -> Response {
    if let Err(e) = validate_required("subject", &body.subject)
        .and_then(|_| validate_required("message", &body.message))
    {
        return unprocessable::<SubmittedNotification>(e.to_string());
    }

    match state.producer.submit(&body.subject, &body.message).await {
        Ok(id) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                SubmittedNotification { id },
                "Notification submitted".to_string(),
            )),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<SubmittedNotification>::error(
                e.to_string(),
                "Unable to save notification".to_string(),
            )),
        )
            .into_response(),
    }
}

async fn list_notifications<S: StoreConnector>(State(state): State<Arc<AppState<S>>>) -> Response {
    let mut session = match state.store.open().await {
        Ok(session) => session,
        Err(e) => return store_failure::<Vec<Notification>>(e.to_string()),
    };

    let result = session.list_notifications().await;
    session.close().await;

    match result {
        Ok(notifications) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                notifications,
                "Notifications retrieved".to_string(),
            )),
        )
            .into_response(),
        Err(e) => store_failure::<Vec<Notification>>(e.to_string()),
    }
}

async fn list_attendees<S: StoreConnector>(State(state): State<Arc<AppState<S>>>) -> Response {
    let mut session = match state.store.open().await {
        Ok(session) => session,
        Err(e) => return store_failure::<Vec<Attendee>>(e.to_string()),
    };

    let result = session.list_attendees().await;
    session.close().await;

    match result {
        Ok(attendees) => (
            StatusCode::OK,
            Json(ApiResponse::success(attendees, "Attendees retrieved".to_string())),
        )
            .into_response(),
        Err(e) => store_failure::<Vec<Attendee>>(e.to_string()),
    }
}

async fn register_attendee<S: StoreConnector>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<NewAttendee>,
) -> Response {
    if let Err(e) = validate_required("first_name", &body.first_name)
        .and_then(|_| validate_required("last_name", &body.last_name))
        .and_then(|_| validate_email(&body.email))
    {
        return unprocessable::<Attendee>(e.to_string());
    }

    let mut session = match state.store.open().await {
        Ok(session) => session,
        Err(e) => return store_failure::<Attendee>(e.to_string()),
    };

    let result = session
        .register_attendee(&body, state.conference_id, Utc::now())
        .await;
    session.close().await;

    match result {
        Ok(attendee) => {
            let message = format!(
                "Thank you, {} {}, for registering!",
                attendee.first_name, attendee.last_name
            );
            (StatusCode::CREATED, Json(ApiResponse::success(attendee, message))).into_response()
        }
        Err(e) => store_failure::<Attendee>(e.to_string()),
    }
}

fn unprocessable<T: serde::Serialize>(error: String) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::<T>::error(error, "Validation failed".to_string())),
    )
        .into_response()
}

fn store_failure<T: serde::Serialize>(error: String) -> Response {
    error!(error = %error, "Store request failed");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<T>::error(error, "Database request failed".to_string())),
    )
        .into_response()
}
