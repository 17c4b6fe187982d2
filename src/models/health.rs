use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::channel::ChannelType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub checks: BTreeMap<ChannelType, ServiceHealth>,
}

impl HealthCheckResponse {
    /// Healthy when every channel is, unhealthy when none is available,
    /// degraded in between.
    pub fn from_checks(checks: BTreeMap<ChannelType, ServiceHealth>) -> Self {
        let available = checks
            .values()
            .filter(|health| health.status != HealthStatus::Unhealthy)
            .count();
        let healthy = checks
            .values()
            .filter(|health| health.status == HealthStatus::Healthy)
            .count();

        let status = if available == 0 {
            HealthStatus::Unhealthy
        } else if healthy == checks.len() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        Self {
            status,
            timestamp: Utc::now(),
            checks,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status != HealthStatus::Unhealthy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    pub backend: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceHealth {
    pub fn healthy(backend: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            status: HealthStatus::Healthy,
            backend: backend.into(),
            response_time_ms: Some(response_time_ms),
            circuit_breaker: None,
            error: None,
        }
    }

    pub fn unhealthy(backend: impl Into<String>, error: String) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            backend: backend.into(),
            response_time_ms: None,
            circuit_breaker: None,
            error: Some(error),
        }
    }

    pub fn with_circuit_breaker(mut self, state: String) -> Self {
        self.circuit_breaker = Some(state);
        self
    }
}
