use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

const SENDGRID_KEY_PLACEHOLDER: &str = "YOUR_SENDGRID_API_KEY";

#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    Api,
    Worker,
    All,
}

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    #[serde(default = "default_postgres_url")]
    pub postgres_url: String,
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,
    #[serde(default = "default_postgres_db")]
    pub postgres_db: String,
    #[serde(default = "default_postgres_user")]
    pub postgres_user: String,
    #[serde(default)]
    pub postgres_pw: String,

    #[serde(default)]
    pub rabbitmq_url: Option<String>,
    #[serde(default = "default_notification_queue_name")]
    pub notification_queue_name: String,
    #[serde(default = "default_failed_queue_name")]
    pub failed_queue_name: String,
    #[serde(default = "default_prefetch_count")]
    pub prefetch_count: u16,
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    #[serde(default)]
    pub sendgrid_api_key: Option<String>,
    #[serde(default = "default_sendgrid_api_url")]
    pub sendgrid_api_url: String,
    #[serde(default = "default_admin_email_address")]
    pub admin_email_address: String,
    #[serde(default = "default_email_send_concurrency")]
    pub email_send_concurrency: usize,

    #[serde(default = "default_conference_id")]
    pub conference_id: i32,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_service_role")]
    pub service_role: ServiceRole,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Self>(vars)
            .map_err(|e| anyhow!("Invalid or missing environment variable: {}", e))?;
        Ok(config)
    }

    /// Queue broker address, if one is configured.
    pub fn rabbitmq_url(&self) -> Option<&str> {
        self.rabbitmq_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// SendGrid key, ignoring blanks and the sample placeholder.
    pub fn sendgrid_api_key(&self) -> Option<&str> {
        self.sendgrid_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && *key != SENDGRID_KEY_PLACEHOLDER)
    }

    pub fn postgres_config(&self) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.postgres_url)
            .port(self.postgres_port)
            .dbname(&self.postgres_db)
            .user(&self.postgres_user)
            .connect_timeout(Duration::from_secs(10));

        if !self.postgres_pw.is_empty() {
            pg.password(&self.postgres_pw);
        }

        pg
    }

    pub fn runs_api(&self) -> bool {
        matches!(self.service_role, ServiceRole::Api | ServiceRole::All)
    }

    pub fn runs_worker(&self) -> bool {
        matches!(self.service_role, ServiceRole::Worker | ServiceRole::All)
    }
}

fn default_postgres_url() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_db() -> String {
    "techconfdb".to_string()
}

fn default_postgres_user() -> String {
    "postgres".to_string()
}

fn default_notification_queue_name() -> String {
    "notificationqueue".to_string()
}

fn default_failed_queue_name() -> String {
    "notificationqueue-failed".to_string()
}

fn default_prefetch_count() -> u16 {
    10
}

fn default_worker_concurrency() -> usize {
    4
}

fn default_sendgrid_api_url() -> String {
    "https://api.sendgrid.com/v3".to_string()
}

fn default_admin_email_address() -> String {
    "info@techconf.com".to_string()
}

fn default_email_send_concurrency() -> usize {
    1
}

fn default_conference_id() -> i32 {
    1
}

fn default_server_port() -> u16 {
    8080
}

fn default_service_role() -> ServiceRole {
    ServiceRole::All
}
