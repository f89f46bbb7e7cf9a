//! Outbound email delivery.
//!
//! [`SendGridSender`] talks to the SendGrid v3 API. When no API key is
//! configured, [`LoggingSender`] stands in and only logs what it would send.

use std::{sync::Arc, time::Duration};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    clients::EmailSender,
    config::Config,
    error::EmailSendError,
    models::email::SentEmail,
};

/// Picks SendGrid when a key is configured, the logging no-op otherwise.
pub fn email_sender_from_config(config: &Config) -> Result<Arc<dyn EmailSender>, Error> {
    match config.sendgrid_api_key() {
        Some(api_key) => Ok(Arc::new(SendGridSender::new(
            api_key.to_string(),
            config.admin_email_address.clone(),
            config.sendgrid_api_url.clone(),
        )?)),
        None => {
            warn!("SendGrid API key not configured, emails will only be logged");
            Ok(Arc::new(LoggingSender))
        }
    }
}

pub struct SendGridSender {
    http_client: Client,
    api_key: String,
    from_email: String,
    api_url: String,
}

impl SendGridSender {
    pub fn new(api_key: String, from_email: String, api_url: String) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        info!(api_url = %api_url, from = %from_email, "SendGrid sender initialized");

        Ok(Self {
            http_client,
            api_key,
            from_email,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct SendGridRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: EmailAddress<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<EmailAddress<'a>>,
}

#[derive(Debug, Serialize)]
struct EmailAddress<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendGridErrors {
    errors: Vec<SendGridErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct SendGridErrorDetail {
    message: String,
}

#[async_trait]
impl EmailSender for SendGridSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<SentEmail, EmailSendError> {
        let request = SendGridRequest {
            personalizations: vec![Personalization {
                to: vec![EmailAddress { email: to }],
            }],
            from: EmailAddress {
                email: &self.from_email,
            },
            subject,
            content: vec![Content {
                content_type: "text/plain",
                value: body,
            }],
        };

        debug!(to, subject, "Sending email via SendGrid");

        let response = self
            .http_client
            .post(format!("{}/mail/send", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if status.is_success() {
            info!(to, message_id = ?message_id, "Email accepted by SendGrid");
            return Ok(SentEmail { message_id });
        }

        let error_body = response.text().await.unwrap_or_default();
        let reason = match serde_json::from_str::<SendGridErrors>(&error_body) {
            Ok(parsed) if !parsed.errors.is_empty() => parsed
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join(", "),
            _ => error_body,
        };

        Err(EmailSendError::Rejected {
            status: status.as_u16(),
            reason,
        })
    }

    fn name(&self) -> &'static str {
        "sendgrid"
    }
}

/// No-op sender for environments without provider credentials.
pub struct LoggingSender;

#[async_trait]
impl EmailSender for LoggingSender {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<SentEmail, EmailSendError> {
        info!(to, subject, "SendGrid not configured, would send email");
        Ok(SentEmail::default())
    }

    fn name(&self) -> &'static str {
        "logging"
    }
}
