use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    error::{NotificationError, Result},
    models::{channel::ChannelType, status::NotificationStatus},
};

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// One message addressed to one recipient over one channel, together with
/// the state of its delivery attempts.
///
/// Fields are private: state only moves through the transition methods.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    id: Uuid,
    recipient: String,
    channel_type: ChannelType,
    title: String,
    message: String,
    status: NotificationStatus,
    created_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
    last_attempt_at: Option<DateTime<Utc>>,
    retry_count: u32,
    max_retries: u32,
    error_message: Option<String>,
    metadata: HashMap<String, JsonValue>,
}

impl Notification {
    pub fn new(
        recipient: impl Into<String>,
        channel_type: ChannelType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient: recipient.into(),
            channel_type,
            title: title.into(),
            message: message.into(),
            status: NotificationStatus::Pending,
            created_at: Utc::now(),
            sent_at: None,
            last_attempt_at: None,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            error_message: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Copy of this notification's content addressed to another channel.
    /// The copy gets a fresh id and starts over in `Pending`.
    pub fn derive_for_channel(&self, channel_type: ChannelType, recipient: impl Into<String>) -> Self {
        Self {
            metadata: self.metadata.clone(),
            max_retries: self.max_retries,
            ..Self::new(recipient, channel_type, self.title.clone(), self.message.clone())
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> NotificationStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.sent_at
    }

    pub fn last_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.last_attempt_at
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn metadata(&self) -> &HashMap<String, JsonValue> {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&JsonValue> {
        self.metadata.get(key)
    }

    /// Keys are never removed. Writing an existing key replaces its value.
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn begin_send(&mut self) -> Result<()> {
        if self.status != NotificationStatus::Pending && !self.status.can_retry() {
            return Err(self.illegal("begin sending"));
        }
        self.status = NotificationStatus::Sending;
        self.last_attempt_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_sent(&mut self) -> Result<()> {
        if self.status != NotificationStatus::Sending {
            return Err(self.illegal("mark as sent"));
        }
        self.status = NotificationStatus::Sent;
        self.sent_at = Some(Utc::now());
        self.error_message = None;
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<()> {
        if !matches!(
            self.status,
            NotificationStatus::Sending | NotificationStatus::Retrying
        ) {
            return Err(self.illegal("mark as failed"));
        }
        self.status = if self.retry_count >= self.max_retries {
            NotificationStatus::FailedFinal
        } else {
            NotificationStatus::Failed
        };
        self.error_message = Some(reason.into());
        self.last_attempt_at = Some(Utc::now());
        Ok(())
    }

    /// Ends a retry that was refused before any attempt was made. Such a
    /// refusal repeats on every retry, so the notification goes straight to
    /// `FailedFinal` regardless of the remaining budget.
    pub fn reject_final(&mut self, reason: impl Into<String>) -> Result<()> {
        if self.status != NotificationStatus::Retrying {
            return Err(self.illegal("reject"));
        }
        self.status = NotificationStatus::FailedFinal;
        self.error_message = Some(reason.into());
        self.last_attempt_at = Some(Utc::now());
        Ok(())
    }

    /// Consumes one retry from the budget. Returns false, without touching
    /// any state, when the budget is spent or the status does not allow it.
    pub fn retry(&mut self) -> bool {
        if !self.status.can_retry() || self.retry_count >= self.max_retries {
            return false;
        }
        self.retry_count += 1;
        self.status = NotificationStatus::Retrying;
        self.last_attempt_at = Some(Utc::now());
        true
    }

    /// Returns true if the notification moved to `Cancelled`; terminal
    /// notifications are left as they are.
    pub fn cancel(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = NotificationStatus::Cancelled;
        true
    }

    /// Records why a notification was refused before any attempt was made.
    /// The status is left unchanged.
    pub fn record_rejection(&mut self, reason: impl Into<String>) {
        self.error_message = Some(reason.into());
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn needs_retry(&self) -> bool {
        self.status == NotificationStatus::Failed && self.retry_count < self.max_retries
    }

    fn illegal(&self, action: &'static str) -> NotificationError {
        NotificationError::IllegalState {
            id: self.id,
            action,
            status: self.status,
        }
    }
}

impl PartialEq for Notification {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Notification {}

impl Hash for Notification {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Shared, lockable reference to a notification.
///
/// The dispatcher, async workers and the retry scheduler all hold clones of
/// the same handle. Never hold the guard across an `.await`.
#[derive(Debug, Clone)]
pub struct NotificationHandle {
    id: Uuid,
    inner: Arc<Mutex<Notification>>,
}

impl NotificationHandle {
    pub fn new(notification: Notification) -> Self {
        Self {
            id: notification.id(),
            inner: Arc::new(Mutex::new(notification)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn lock(&self) -> MutexGuard<'_, Notification> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Notification {
        self.lock().clone()
    }

    pub fn status(&self) -> NotificationStatus {
        self.lock().status()
    }

    pub fn needs_retry(&self) -> bool {
        self.lock().needs_retry()
    }
}

impl From<Notification> for NotificationHandle {
    fn from(notification: Notification) -> Self {
        Self::new(notification)
    }
}
