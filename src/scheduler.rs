use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use futures_util::{
    FutureExt,
    future::{self, BoxFuture},
};
use tokio::time::{sleep, timeout};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    dispatcher::CompositeDispatcher,
    error::{NotificationError, Result},
    models::{
        notification::NotificationHandle,
        retry::{BackoffStrategy, RetryConfig, RetryStatus},
        status::NotificationStatus,
    },
    utils::jittered,
};

/// Resolves once the retry chain for one notification is over: `Ok(true)`
/// when a retry delivered it, `Ok(false)` when it was cancelled, ineligible
/// or out of retries, `Err` when a retry attempt broke internally.
pub type RetryFuture = BoxFuture<'static, Result<bool>>;

struct RetryTask {
    task_id: u64,
    notification: NotificationHandle,
    strategy: BackoffStrategy,
    scheduled_at: DateTime<Utc>,
    delay: Duration,
    token: CancellationToken,
}

struct SchedulerInner {
    dispatcher: Arc<CompositeDispatcher>,
    config: RetryConfig,
    pending: Mutex<HashMap<Uuid, RetryTask>>,
    next_task_id: AtomicU64,
    timers: TaskTracker,
    shutdown: CancellationToken,
    terminate: CancellationToken,
}

/// Re-dispatches failed notifications after a backoff delay.
///
/// At most one retry is pending per notification. Must be used from within a
/// Tokio runtime: every scheduled retry runs as its own timer task.
#[derive(Clone)]
pub struct RetryScheduler {
    inner: Arc<SchedulerInner>,
}

impl RetryScheduler {
    pub fn new(dispatcher: Arc<CompositeDispatcher>, config: RetryConfig) -> Self {
        info!(
            base_delay_ms = config.base_delay.as_millis() as u64,
            max_delay_ms = config.max_delay.as_millis() as u64,
            multiplier = config.backoff_multiplier,
            "Retry scheduler initialized"
        );

        Self {
            inner: Arc::new(SchedulerInner {
                dispatcher,
                config,
                pending: Mutex::new(HashMap::new()),
                next_task_id: AtomicU64::new(1),
                timers: TaskTracker::new(),
                shutdown: CancellationToken::new(),
                terminate: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.inner.config
    }

    pub fn schedule_retry(
        &self,
        handle: &NotificationHandle,
        strategy: BackoffStrategy,
    ) -> RetryFuture {
        let id = handle.id();

        if self.inner.shutdown.is_cancelled() {
            warn!(notification_id = %id, "Scheduler is shut down, retry not scheduled");
            return future::ready(Ok(false)).boxed();
        }

        let delay = {
            let notification = handle.lock();
            if !notification.needs_retry() {
                debug!(
                    notification_id = %id,
                    status = %notification.status(),
                    retry_count = notification.retry_count(),
                    "Notification is not eligible for retry"
                );
                return future::ready(Ok(false)).boxed();
            }
            self.inner.next_delay(strategy, notification.retry_count())
        };

        let Some((task_id, token)) = self.inner.register(handle, strategy, delay) else {
            debug!(notification_id = %id, "Retry already pending, not scheduling another");
            return future::ready(Ok(false)).boxed();
        };

        let inner = Arc::clone(&self.inner);
        let handle = handle.clone();
        let task = self
            .inner
            .timers
            .spawn(async move { inner.drive(handle, strategy, delay, task_id, token).await });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(NotificationError::internal(format!(
                    "Retry task for {} terminated: {}",
                    id, e
                ))),
            }
        }
        .boxed()
    }

    pub fn schedule_retries(
        &self,
        handles: &[NotificationHandle],
        strategy: BackoffStrategy,
    ) -> Vec<RetryFuture> {
        handles
            .iter()
            .map(|handle| self.schedule_retry(handle, strategy))
            .collect()
    }

    /// Returns whether a retry was pending. A retry whose dispatch is
    /// already under way is not interrupted.
    pub fn cancel_retry(&self, notification_id: Uuid) -> bool {
        let removed = self.inner.lock_pending().remove(&notification_id);

        match removed {
            Some(task) => {
                task.token.cancel();
                info!(notification_id = %notification_id, "Retry cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all_retries(&self) {
        let drained: Vec<RetryTask> = self
            .inner
            .lock_pending()
            .drain()
            .map(|(_, task)| task)
            .collect();

        for task in &drained {
            task.token.cancel();
        }

        if !drained.is_empty() {
            info!(cancelled = drained.len(), "All pending retries cancelled");
        }
    }

    pub fn pending_retry_count(&self) -> usize {
        self.inner.lock_pending().len()
    }

    pub fn retry_status(&self, notification_id: Uuid) -> Option<RetryStatus> {
        let entry = self
            .inner
            .lock_pending()
            .get(&notification_id)
            .map(RetryEntry::from);

        entry.map(RetryEntry::into_status)
    }

    pub fn all_retry_statuses(&self) -> Vec<RetryStatus> {
        let entries: Vec<RetryEntry> = self
            .inner
            .lock_pending()
            .values()
            .map(RetryEntry::from)
            .collect();

        let mut statuses: Vec<_> = entries.into_iter().map(RetryEntry::into_status).collect();
        statuses.sort_by_key(|status| status.scheduled_at);
        statuses
    }

    /// Cancels everything pending, then waits up to the configured timeout
    /// for running retries before aborting their dispatch.
    pub async fn shutdown(&self) {
        info!("Shutting down retry scheduler");

        self.cancel_all_retries();
        self.inner.shutdown.cancel();
        self.inner.timers.close();

        let grace = self.inner.config.shutdown_timeout;
        if timeout(grace, self.inner.timers.wait()).await.is_err() {
            warn!(
                in_flight = self.inner.timers.len(),
                timeout_ms = grace.as_millis() as u64,
                "Retry tasks still running after shutdown timeout, terminating"
            );
            self.inner.terminate.cancel();
            let _ = timeout(Duration::from_secs(1), self.inner.timers.wait()).await;
        }

        info!("Retry scheduler stopped");
    }
}

impl SchedulerInner {
    fn next_delay(&self, strategy: BackoffStrategy, retry_count: u32) -> Duration {
        jittered(
            strategy.delay(retry_count, &self.config),
            self.config.jitter_ratio,
            self.config.max_delay,
        )
    }

    /// Records a pending retry unless one already exists for this notification.
    fn register(
        &self,
        handle: &NotificationHandle,
        strategy: BackoffStrategy,
        delay: Duration,
    ) -> Option<(u64, CancellationToken)> {
        let mut pending = self.lock_pending();
        if pending.contains_key(&handle.id()) {
            return None;
        }

        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let token = self.shutdown.child_token();
        let now = Utc::now();
        let scheduled_at = TimeDelta::from_std(delay)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(now);

        pending.insert(
            handle.id(),
            RetryTask {
                task_id,
                notification: handle.clone(),
                strategy,
                scheduled_at,
                delay,
                token: token.clone(),
            },
        );

        Some((task_id, token))
    }

    /// Drops the table entry if it still belongs to `task_id`.
    fn release(&self, notification_id: Uuid, task_id: u64) {
        let mut pending = self.lock_pending();
        if pending
            .get(&notification_id)
            .is_some_and(|task| task.task_id == task_id)
        {
            pending.remove(&notification_id);
        }
    }

    async fn drive(
        self: Arc<Self>,
        handle: NotificationHandle,
        strategy: BackoffStrategy,
        mut delay: Duration,
        mut task_id: u64,
        mut token: CancellationToken,
    ) -> Result<bool> {
        let id = handle.id();

        loop {
            debug!(
                notification_id = %id,
                ?strategy,
                delay_ms = delay.as_millis() as u64,
                "Retry scheduled"
            );

            tokio::select! {
                _ = token.cancelled() => {
                    self.release(id, task_id);
                    debug!(notification_id = %id, "Retry cancelled before it fired");
                    return Ok(false);
                }
                _ = sleep(delay) => {}
            }

            self.release(id, task_id);
            if token.is_cancelled() {
                return Ok(false);
            }

            let retry_count = {
                let mut notification = handle.lock();
                if !notification.needs_retry() || !notification.retry() {
                    debug!(
                        notification_id = %id,
                        status = %notification.status(),
                        "Notification no longer needs a retry"
                    );
                    return Ok(false);
                }
                notification.retry_count()
            };

            info!(notification_id = %id, retry_count, "Retrying notification");

            let outcome = tokio::select! {
                _ = self.terminate.cancelled() => Err(NotificationError::internal(
                    "Retry aborted by scheduler shutdown",
                )),
                result = self.dispatcher.dispatch(&handle) => result,
            };

            match outcome {
                Ok(true) => {
                    info!(notification_id = %id, retry_count, "Retry delivered notification");
                    return Ok(true);
                }
                Ok(false) => {
                    let next_delay = {
                        let mut notification = handle.lock();

                        // Refused before any attempt was made; never retried again.
                        if notification.status() == NotificationStatus::Retrying {
                            let reason = notification
                                .error_message()
                                .unwrap_or("Retry was not attempted")
                                .to_string();
                            if let Err(e) = notification.reject_final(reason) {
                                debug!(notification_id = %id, error = %e, "Could not record retry rejection");
                            }
                            warn!(
                                notification_id = %id,
                                retry_count = notification.retry_count(),
                                "Retry rejected before delivery"
                            );
                            return Ok(false);
                        }

                        if !notification.needs_retry() {
                            warn!(
                                notification_id = %id,
                                status = %notification.status(),
                                retry_count = notification.retry_count(),
                                "Retries exhausted"
                            );
                            return Ok(false);
                        }
                        self.next_delay(strategy, notification.retry_count())
                    };

                    if self.shutdown.is_cancelled() {
                        return Ok(false);
                    }

                    match self.register(&handle, strategy, next_delay) {
                        Some((next_task_id, next_token)) => {
                            task_id = next_task_id;
                            token = next_token;
                            delay = next_delay;
                        }
                        None => {
                            debug!(notification_id = %id, "Another retry is already pending");
                            return Ok(false);
                        }
                    }
                }
                Err(e) => {
                    error!(notification_id = %id, error = %e, "Retry attempt failed internally");

                    let mut notification = handle.lock();
                    if let Err(mark_err) = notification.mark_failed(format!("Retry failed: {}", e)) {
                        debug!(notification_id = %id, error = %mark_err, "Could not record retry failure");
                    }
                    return Err(e);
                }
            }
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<Uuid, RetryTask>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Copy of a table entry taken under the table lock, turned into a
/// [`RetryStatus`] after the lock is released.
struct RetryEntry {
    notification: NotificationHandle,
    strategy: BackoffStrategy,
    scheduled_at: DateTime<Utc>,
    delay: Duration,
    cancelled: bool,
}

impl From<&RetryTask> for RetryEntry {
    fn from(task: &RetryTask) -> Self {
        Self {
            notification: task.notification.clone(),
            strategy: task.strategy,
            scheduled_at: task.scheduled_at,
            delay: task.delay,
            cancelled: task.token.is_cancelled(),
        }
    }
}

impl RetryEntry {
    fn into_status(self) -> RetryStatus {
        let notification = self.notification.lock();

        RetryStatus {
            notification_id: notification.id(),
            channel_type: notification.channel_type(),
            recipient: notification.recipient().to_string(),
            status: notification.status(),
            strategy: self.strategy,
            retry_count: notification.retry_count(),
            max_retries: notification.max_retries(),
            scheduled_at: self.scheduled_at,
            delay_ms: self.delay.as_millis() as u64,
            cancelled: self.cancelled,
            last_error: notification.error_message().map(str::to_string),
        }
    }
}
