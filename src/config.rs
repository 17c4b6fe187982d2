use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::{
    clients::{
        email::EmailBackend,
        in_app::{InAppBackend, InAppInbox}, provider::ProviderSettings, push::PushBackend,
        service::ChannelService, sms::SmsBackend, worker_pool::WorkerPool,
    },
    dispatcher::CompositeDispatcher,
    models::{circuit_breaker::CircuitBreakerConfig, retry::RetryConfig},
};

#[derive(Clone, Deserialize, Debug)]
#[serde(default)]
pub struct Config {
    pub email_enabled: bool,
    pub email_smtp_host: String,
    pub email_from_address: String,
    pub email_failure_rate: f64,
    pub email_latency_ms: u64,

    pub sms_enabled: bool,
    pub sms_gateway_url: String,
    pub sms_api_key: String,
    pub sms_sender_id: String,
    pub sms_cost_per_segment: f64,
    pub sms_failure_rate: f64,
    pub sms_latency_ms: u64,

    pub push_enabled: bool,
    pub push_project_id: String,
    pub push_failure_rate: f64,
    pub push_latency_ms: u64,

    pub in_app_enabled: bool,
    pub in_app_latency_ms: u64,

    pub retry_base_delay_seconds: f64,
    pub retry_max_delay_seconds: f64,
    pub retry_backoff_multiplier: f64,
    pub retry_jitter_ratio: f64,

    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_timeout_seconds: u64,
    pub circuit_breaker_success_threshold: u32,

    pub worker_concurrency: usize,
    pub shutdown_timeout_seconds: u64,

    pub server_port: u16,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email_enabled: true,
            email_smtp_host: "smtp.localhost".to_string(),
            email_from_address: "noreply@localhost.localdomain".to_string(),
            email_failure_rate: 0.0,
            email_latency_ms: 0,

            sms_enabled: true,
            sms_gateway_url: "https://sms-gateway.local/v1/messages".to_string(),
            sms_api_key: "local-sms-key".to_string(),
            sms_sender_id: "NOTIFY".to_string(),
            sms_cost_per_segment: 0.0075,
            sms_failure_rate: 0.0,
            sms_latency_ms: 0,

            push_enabled: true,
            push_project_id: "local-project".to_string(),
            push_failure_rate: 0.0,
            push_latency_ms: 0,

            in_app_enabled: true,
            in_app_latency_ms: 0,

            retry_base_delay_seconds: 5.0,
            retry_max_delay_seconds: 300.0,
            retry_backoff_multiplier: 2.0,
            retry_jitter_ratio: 0.0,

            circuit_breaker_failure_threshold: 5,
            circuit_breaker_timeout_seconds: 30,
            circuit_breaker_success_threshold: 2,

            worker_concurrency: 16,
            shutdown_timeout_seconds: 60,

            server_port: 8080,
            log_json: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid environmental variable: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        for (name, rate) in [
            ("EMAIL_FAILURE_RATE", self.email_failure_rate),
            ("SMS_FAILURE_RATE", self.sms_failure_rate),
            ("PUSH_FAILURE_RATE", self.push_failure_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(anyhow!("{} must be between 0 and 1, got {}", name, rate));
            }
        }

        if !(self.retry_base_delay_seconds >= 0.0 && self.retry_base_delay_seconds.is_finite()) {
            return Err(anyhow!("RETRY_BASE_DELAY_SECONDS must be a non-negative number"));
        }

        if !(self.retry_max_delay_seconds >= self.retry_base_delay_seconds
            && self.retry_max_delay_seconds.is_finite())
        {
            return Err(anyhow!(
                "RETRY_MAX_DELAY_SECONDS must be at least RETRY_BASE_DELAY_SECONDS"
            ));
        }

        if !(self.retry_backoff_multiplier >= 1.0 && self.retry_backoff_multiplier.is_finite()) {
            return Err(anyhow!("RETRY_BACKOFF_MULTIPLIER must be at least 1.0"));
        }

        if !(0.0..1.0).contains(&self.retry_jitter_ratio) {
            return Err(anyhow!("RETRY_JITTER_RATIO must be in [0, 1)"));
        }

        if self.worker_concurrency == 0 {
            return Err(anyhow!("WORKER_CONCURRENCY must be greater than zero"));
        }

        if self.circuit_breaker_failure_threshold == 0 || self.circuit_breaker_success_threshold == 0 {
            return Err(anyhow!("Circuit breaker thresholds must be greater than zero"));
        }

        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            base_delay: Duration::from_secs_f64(self.retry_base_delay_seconds),
            max_delay: Duration::from_secs_f64(self.retry_max_delay_seconds),
            backoff_multiplier: self.retry_backoff_multiplier,
            jitter_ratio: self.retry_jitter_ratio,
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_seconds),
        }
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker_failure_threshold,
            timeout_seconds: self.circuit_breaker_timeout_seconds,
            success_threshold: self.circuit_breaker_success_threshold,
        }
    }

    pub fn email_settings(&self) -> ProviderSettings {
        ProviderSettings {
            enabled: self.email_enabled,
            failure_rate: self.email_failure_rate,
            latency: Duration::from_millis(self.email_latency_ms),
        }
    }

    pub fn sms_settings(&self) -> ProviderSettings {
        ProviderSettings {
            enabled: self.sms_enabled,
            failure_rate: self.sms_failure_rate,
            latency: Duration::from_millis(self.sms_latency_ms),
        }
    }

    pub fn push_settings(&self) -> ProviderSettings {
        ProviderSettings {
            enabled: self.push_enabled,
            failure_rate: self.push_failure_rate,
            latency: Duration::from_millis(self.push_latency_ms),
        }
    }

    pub fn in_app_settings(&self) -> ProviderSettings {
        ProviderSettings {
            enabled: self.in_app_enabled,
            failure_rate: 0.0,
            latency: Duration::from_millis(self.in_app_latency_ms),
        }
    }

    /// Wires the four channel backends into a dispatcher sharing one worker pool.
    /// In-app deliveries land in `inbox`.
    pub fn build_dispatcher(&self, inbox: InAppInbox) -> Result<CompositeDispatcher, Error> {
        let pool = WorkerPool::new(self.worker_concurrency);
        let breaker = self.circuit_breaker_config();

        let email = EmailBackend::new(
            self.email_settings(),
            self.email_smtp_host.clone(),
            self.email_from_address.clone(),
        );
        let sms = SmsBackend::new(
            self.sms_settings(),
            self.sms_gateway_url.clone(),
            self.sms_api_key.clone(),
            self.sms_sender_id.clone(),
            self.sms_cost_per_segment,
        );
        let push = PushBackend::new(self.push_settings(), self.push_project_id.clone());
        let in_app = InAppBackend::with_inbox(self.in_app_settings(), inbox);

        let dispatcher = CompositeDispatcher::new()
            .with_service(ChannelService::new(email, breaker.clone(), pool.clone()))?
            .with_service(ChannelService::new(sms, breaker.clone(), pool.clone()))?
            .with_service(ChannelService::new(push, breaker.clone(), pool.clone()))?
            .with_service(ChannelService::new(in_app, breaker, pool))?;

        Ok(dispatcher)
    }
}
