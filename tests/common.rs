use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use notification_core::{
    ChannelBackend, ChannelService, ChannelType, CompositeDispatcher, DeliveryReceipt, Notification,
    NotificationHandle, NotificationStatus,
    clients::worker_pool::WorkerPool,
    models::circuit_breaker::CircuitBreakerConfig,
};

/// Shared view into a [`ScriptedBackend`] after it has been moved into a service.
#[derive(Clone, Default)]
pub struct Probe {
    calls: Arc<AtomicU32>,
    unhealthy: Arc<AtomicBool>,
}

impl Probe {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::SeqCst);
    }
}

/// In-test backend. Recipient conventions:
/// `invalid...` fails validation, `fail...` fails delivery, `slow...` takes
/// 50ms, `hang...` takes ten minutes. Everything else follows
/// `default_success`.
pub struct ScriptedBackend {
    name: &'static str,
    types: HashSet<ChannelType>,
    default_success: bool,
    probe: Probe,
}

impl ScriptedBackend {
    pub fn new(name: &'static str, channel_type: ChannelType, default_success: bool) -> (Self, Probe) {
        let probe = Probe::default();
        let backend = Self {
            name,
            types: HashSet::from([channel_type]),
            default_success,
            probe: probe.clone(),
        };
        (backend, probe)
    }
}

#[async_trait]
impl ChannelBackend for ScriptedBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn supported_types(&self) -> HashSet<ChannelType> {
        self.types.clone()
    }

    fn validate_extra(&self, notification: &Notification) -> Result<()> {
        if notification.recipient().starts_with("invalid") {
            return Err(anyhow!("Recipient {} is malformed", notification.recipient()));
        }
        Ok(())
    }

    async fn deliver(&self, notification: &Notification) -> Result<DeliveryReceipt> {
        let attempt = self.probe.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let recipient = notification.recipient();

        if recipient.starts_with("slow") {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if recipient.starts_with("hang") {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }

        let success = !recipient.starts_with("fail") && self.default_success;

        if success {
            Ok(DeliveryReceipt::new()
                .with("backend", self.name)
                .with("attempt", attempt))
        } else {
            Err(anyhow!("simulated outage on {}", self.name))
        }
    }

    async fn health_check(&self) -> Result<()> {
        if self.probe.unhealthy.load(Ordering::SeqCst) {
            return Err(anyhow!("{} endpoint unreachable", self.name));
        }
        Ok(())
    }
}

pub fn lenient_breaker() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: 1_000,
        timeout_seconds: 30,
        success_threshold: 1,
    }
}

pub fn service(backend: ScriptedBackend) -> ChannelService {
    ChannelService::new(backend, lenient_breaker(), WorkerPool::new(8))
}

pub fn dispatcher(backends: Vec<ScriptedBackend>) -> CompositeDispatcher {
    backends
        .into_iter()
        .try_fold(CompositeDispatcher::new(), |dispatcher, backend| {
            dispatcher.with_service(service(backend))
        })
        .unwrap()
}

pub fn email(recipient: &str) -> Notification {
    Notification::new(recipient, ChannelType::Email, "Weekly digest", "Here is what you missed")
}

/// A notification whose first delivery attempt already failed. With
/// `max_retries == 0` it is already `FailedFinal`.
pub fn failed(recipient: &str, channel_type: ChannelType, max_retries: u32) -> NotificationHandle {
    let mut notification = Notification::new(recipient, channel_type, "Alert", "Disk almost full")
        .with_max_retries(max_retries);
    notification.begin_send().unwrap();
    notification.mark_failed("initial attempt failed").unwrap();
    NotificationHandle::new(notification)
}

/// Yields until the notification reaches `status`.
pub async fn wait_for_status(handle: &NotificationHandle, status: NotificationStatus) {
    for _ in 0..10_000 {
        if handle.status() == status {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("notification never reached {}", status);
}
