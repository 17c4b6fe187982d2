use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{channel::ChannelType, status::NotificationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Immediate,
    Linear,
    Exponential,
    FixedInterval,
}

impl BackoffStrategy {
    /// Delay before the retry that follows `retry_count` previous retries.
    pub fn delay(&self, retry_count: u32, config: &RetryConfig) -> Duration {
        let base = config.base_delay.as_secs_f64();
        let max = config.max_delay.as_secs_f64();

        let seconds = match self {
            BackoffStrategy::Immediate => 0.0,
            BackoffStrategy::Linear => (base * (f64::from(retry_count) + 1.0)).min(max),
            BackoffStrategy::Exponential => {
                let exponent = i32::try_from(retry_count).unwrap_or(i32::MAX);
                (base * config.backoff_multiplier.powi(exponent)).min(max)
            }
            BackoffStrategy::FixedInterval => base,
        };

        if seconds.is_finite() && seconds > 0.0 {
            Duration::from_secs_f64(seconds)
        } else if seconds.is_infinite() {
            config.max_delay
        } else {
            Duration::ZERO
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Fraction of random spread applied to every computed delay. Zero disables jitter.
    pub jitter_ratio: f64,
    pub shutdown_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            jitter_ratio: 0.0,
            shutdown_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.backoff_multiplier = backoff_multiplier;
        self
    }
}

/// Snapshot of one pending retry, as reported to monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct RetryStatus {
    pub notification_id: Uuid,
    pub channel_type: ChannelType,
    pub recipient: String,
    pub status: NotificationStatus,
    pub strategy: BackoffStrategy,
    pub retry_count: u32,
    pub max_retries: u32,
    pub scheduled_at: DateTime<Utc>,
    pub delay_ms: u64,
    pub cancelled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
