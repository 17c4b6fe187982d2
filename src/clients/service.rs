use std::{collections::HashSet, sync::Arc, time::Instant};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures_util::{
    FutureExt,
    future::{BoxFuture, join_all},
};
use serde_json::Value as JsonValue;
use tracing::{debug, error, info, warn};

use crate::{
    clients::{circuit_breaker::CircuitBreaker, worker_pool::WorkerPool},
    error::NotificationError,
    models::{
        channel::ChannelType,
        circuit_breaker::{CircuitBreakerConfig, CircuitState},
        health::{HealthStatus, ServiceHealth},
        notification::{Notification, NotificationHandle},
        status::NotificationStatus,
        validation::validate_common,
    },
};

/// Result of an attempt that was handed to a worker. Spawned eagerly, so the
/// attempt runs whether or not the future is polled.
pub type DeliveryFuture<T> = BoxFuture<'static, T>;

/// Provider-side details of a successful delivery, merged into the
/// notification's metadata.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReceipt {
    entries: Vec<(String, JsonValue)>,
}

impl DeliveryReceipt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    pub fn entries(&self) -> &[(String, JsonValue)] {
        &self.entries
    }

    fn apply(self, notification: &mut Notification) {
        for (key, value) in self.entries {
            notification.insert_metadata(key, value);
        }
    }
}

/// The backend-specific part of a channel. Everything else (validation
/// order, state transitions, circuit breaking, async fan-out) is shared by
/// [`ChannelService`].
#[async_trait]
pub trait ChannelBackend: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn supported_types(&self) -> HashSet<ChannelType>;

    /// Rules beyond the common non-empty checks.
    fn validate_extra(&self, notification: &Notification) -> Result<()>;

    async fn deliver(&self, notification: &Notification) -> Result<DeliveryReceipt>;

    async fn health_check(&self) -> Result<()>;

    async fn test_connection(&self) -> Result<()> {
        self.health_check().await
    }
}

#[derive(Clone)]
pub struct ChannelService {
    backend: Arc<dyn ChannelBackend>,
    breaker: Arc<CircuitBreaker>,
    pool: WorkerPool,
}

impl ChannelService {
    pub fn new(
        backend: impl ChannelBackend,
        breaker_config: CircuitBreakerConfig,
        pool: WorkerPool,
    ) -> Self {
        Self::from_arc(Arc::new(backend), breaker_config, pool)
    }

    pub fn from_arc(
        backend: Arc<dyn ChannelBackend>,
        breaker_config: CircuitBreakerConfig,
        pool: WorkerPool,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(backend.name().to_string(), breaker_config));
        info!(backend = backend.name(), "Channel service initialized");

        Self {
            backend,
            breaker,
            pool,
        }
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    pub fn supports_notification_type(&self, channel_type: ChannelType) -> bool {
        self.backend.supported_types().contains(&channel_type)
    }

    pub fn supported_types(&self) -> HashSet<ChannelType> {
        self.backend.supported_types()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Never fails: an invalid notification is logged and reported as `false`.
    pub fn validate_notification(&self, notification: &Notification) -> bool {
        match self.check(notification) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    notification_id = %notification.id(),
                    backend = self.name(),
                    error = %e,
                    "Notification failed validation"
                );
                false
            }
        }
    }

    fn check(&self, notification: &Notification) -> Result<()> {
        if !self.supports_notification_type(notification.channel_type()) {
            return Err(anyhow!(
                "Channel type {} is not supported by {}",
                notification.channel_type(),
                self.name()
            ));
        }
        validate_common(notification)?;
        self.backend.validate_extra(notification)
    }

    /// One attempt: validate, begin sending, deliver through the breaker and
    /// record the outcome on the notification.
    ///
    /// Provider failures become a `mark_failed` transition and `Ok(false)`.
    /// Only contract violations (illegal transitions) come back as errors.
    pub async fn deliver(&self, handle: &NotificationHandle) -> Result<bool, NotificationError> {
        let snapshot = {
            let mut notification = handle.lock();

            if let Err(e) = self.check(&notification) {
                warn!(
                    notification_id = %handle.id(),
                    backend = self.name(),
                    error = %e,
                    "Notification rejected before sending"
                );
                notification.record_rejection(format!("Validation failed: {}", e));
                return Ok(false);
            }

            notification.begin_send()?;
            notification.clone()
        };

        debug!(
            notification_id = %snapshot.id(),
            channel = %snapshot.channel_type(),
            retry_count = snapshot.retry_count(),
            "Sending notification"
        );

        let outcome = self
            .breaker
            .call(|| self.backend.deliver(&snapshot))
            .await;

        let mut notification = handle.lock();

        if notification.status() == NotificationStatus::Cancelled {
            info!(
                notification_id = %handle.id(),
                "Notification was cancelled while in flight, discarding outcome"
            );
            return Ok(false);
        }

        match outcome {
            Ok(receipt) => {
                receipt.apply(&mut notification);
                notification.mark_sent()?;
                info!(
                    notification_id = %handle.id(),
                    channel = %notification.channel_type(),
                    "Notification sent successfully"
                );
                Ok(true)
            }
            Err(e) => {
                notification.mark_failed(e.to_string())?;
                warn!(
                    notification_id = %handle.id(),
                    channel = %notification.channel_type(),
                    status = %notification.status(),
                    retry_count = notification.retry_count(),
                    error = %e,
                    "Notification delivery failed"
                );
                Ok(false)
            }
        }
    }

    pub async fn send_notification(&self, handle: &NotificationHandle) -> bool {
        match self.deliver(handle).await {
            Ok(sent) => sent,
            Err(e) => {
                error!(notification_id = %handle.id(), error = %e, "Send attempt aborted");
                false
            }
        }
    }

    pub fn send_notification_async(&self, handle: NotificationHandle) -> DeliveryFuture<bool> {
        let service = self.clone();
        let id = handle.id();
        let task = self
            .pool
            .spawn(async move { service.send_notification(&handle).await });

        async move {
            task.await.unwrap_or_else(|e| {
                error!(notification_id = %id, error = %e, "Send worker terminated abnormally");
                false
            })
        }
        .boxed()
    }

    pub async fn send_notifications(&self, handles: &[NotificationHandle]) -> Vec<bool> {
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(self.send_notification(handle).await);
        }
        results
    }

    /// Results keep the input order whatever order the attempts finish in.
    pub fn send_notifications_async(
        &self,
        handles: Vec<NotificationHandle>,
    ) -> DeliveryFuture<Vec<bool>> {
        let attempts: Vec<_> = handles
            .into_iter()
            .map(|handle| self.send_notification_async(handle))
            .collect();

        join_all(attempts).boxed()
    }

    pub async fn is_healthy(&self) -> bool {
        match self.backend.health_check().await {
            Ok(()) => true,
            Err(e) => {
                warn!(backend = self.name(), error = %e, "Health check failed");
                false
            }
        }
    }

    pub async fn test_connection(&self) -> bool {
        match self.backend.test_connection().await {
            Ok(()) => true,
            Err(e) => {
                warn!(backend = self.name(), error = %e, "Connection test failed");
                false
            }
        }
    }

    pub async fn health(&self) -> ServiceHealth {
        let start = Instant::now();
        let circuit = self.breaker.state();

        match self.backend.health_check().await {
            Ok(()) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(backend = self.name(), response_time_ms = elapsed, "Health check passed");

                let mut health = ServiceHealth::healthy(self.name(), elapsed)
                    .with_circuit_breaker(circuit.as_str().to_string());
                if circuit != CircuitState::Closed {
                    health.status = HealthStatus::Degraded;
                    health.error = Some(format!("Circuit breaker is {}", circuit));
                }
                health
            }
            Err(e) => {
                warn!(backend = self.name(), error = %e, "Health check failed");
                ServiceHealth::unhealthy(self.name(), e.to_string())
                    .with_circuit_breaker(circuit.as_str().to_string())
            }
        }
    }
}
