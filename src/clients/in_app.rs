use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    clients::{
        provider::ProviderSettings,
        service::{ChannelBackend, DeliveryReceipt},
    },
    models::{
        channel::ChannelType,
        notification::Notification,
        validation::{
            IN_APP_MESSAGE_MAX_CHARS, IN_APP_TITLE_MAX_CHARS, validate_max_chars, validate_user_id,
        },
    },
};

#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    pub id: Uuid,
    pub notification_id: Uuid,
    pub title: String,
    pub message: String,
    pub delivered_at: DateTime<Utc>,
    pub read: bool,
}

/// Per-user in-app inboxes. Cloning shares the same storage.
#[derive(Debug, Clone, Default)]
pub struct InAppInbox {
    entries: Arc<Mutex<HashMap<String, Vec<InboxEntry>>>>,
}

impl InAppInbox {
    pub fn inbox(&self, user_id: &str) -> Vec<InboxEntry> {
        self.lock().get(user_id).cloned().unwrap_or_default()
    }

    pub fn unread_count(&self, user_id: &str) -> usize {
        self.lock()
            .get(user_id)
            .map(|entries| entries.iter().filter(|entry| !entry.read).count())
            .unwrap_or(0)
    }

    pub fn mark_read(&self, user_id: &str, entry_id: Uuid) -> bool {
        let mut guard = self.lock();
        match guard
            .get_mut(user_id)
            .and_then(|entries| entries.iter_mut().find(|entry| entry.id == entry_id))
        {
            Some(entry) => {
                entry.read = true;
                true
            }
            None => false,
        }
    }

    fn push(&self, user_id: &str, entry: InboxEntry) {
        self.lock().entry(user_id.to_string()).or_default().push(entry);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<InboxEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct InAppBackend {
    settings: ProviderSettings,
    inbox: InAppInbox,
}

impl InAppBackend {
    pub fn new(settings: ProviderSettings) -> Self {
        Self::with_inbox(settings, InAppInbox::default())
    }

    /// Delivers into `inbox`, which the caller keeps for reading.
    pub fn with_inbox(settings: ProviderSettings, inbox: InAppInbox) -> Self {
        info!(enabled = settings.enabled, "In-app backend initialized");

        Self { settings, inbox }
    }

    pub fn inbox(&self) -> InAppInbox {
        self.inbox.clone()
    }
}

#[async_trait]
impl ChannelBackend for InAppBackend {
    fn name(&self) -> &str {
        "in_app"
    }

    fn supported_types(&self) -> HashSet<ChannelType> {
        HashSet::from([ChannelType::InApp])
    }

    fn validate_extra(&self, notification: &Notification) -> Result<()> {
        validate_user_id(notification.recipient())?;
        validate_max_chars("In-app title", notification.title(), IN_APP_TITLE_MAX_CHARS)?;
        validate_max_chars("In-app message", notification.message(), IN_APP_MESSAGE_MAX_CHARS)
    }

    async fn deliver(&self, notification: &Notification) -> Result<DeliveryReceipt> {
        self.settings
            .simulate_call("In-app", || {
                format!("In-app store unavailable for user {}", notification.recipient())
            })
            .await?;

        let entry = InboxEntry {
            id: Uuid::new_v4(),
            notification_id: notification.id(),
            title: notification.title().to_string(),
            message: notification.message().to_string(),
            delivered_at: Utc::now(),
            read: false,
        };
        let entry_id = entry.id;

        self.inbox.push(notification.recipient(), entry);
        debug!(user_id = notification.recipient(), %entry_id, "Stored in-app notification");

        Ok(DeliveryReceipt::new().with("inbox_entry_id", entry_id.to_string()))
    }

    async fn health_check(&self) -> Result<()> {
        self.settings.ensure_enabled("In-app")
    }
}
