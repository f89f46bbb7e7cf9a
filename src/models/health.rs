use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// How submitted notifications reach the dispatcher.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DispatchMode {
    Queued { queue: String },
    Synchronous,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub dispatch: DispatchMode,
    pub checks: BTreeMap<&'static str, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub up: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u64>) -> Self {
        Self {
            up: true,
            response_time_ms,
            error: None,
        }
    }

    pub fn down(error: String) -> Self {
        Self {
            up: false,
            response_time_ms: None,
            error: Some(error),
        }
    }
}

impl HealthReport {
    /// Any component down is unhealthy. Synchronous dispatch works but is
    /// reported as degraded.
    pub fn new(dispatch: DispatchMode, checks: BTreeMap<&'static str, ComponentHealth>) -> Self {
        let status = if checks.values().any(|check| !check.up) {
            HealthStatus::Unhealthy
        } else if dispatch == DispatchMode::Synchronous {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Self {
            status,
            timestamp: Utc::now(),
            dispatch,
            checks,
        }
    }
}
