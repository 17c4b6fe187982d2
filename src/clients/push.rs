use std::collections::{HashMap, HashSet};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    clients::{
        provider::ProviderSettings,
        service::{ChannelBackend, DeliveryReceipt},
    },
    models::{
        channel::ChannelType,
        fcm::{FcmMessage, FcmNotification, FcmRequest},
        notification::Notification,
        validation::{PUSH_BODY_MAX_BYTES, PUSH_TITLE_MAX_CHARS, validate_fcm_token, validate_max_chars},
    },
};

pub struct PushBackend {
    settings: ProviderSettings,
    fcm_project_id: String,
}

impl PushBackend {
    pub fn new(settings: ProviderSettings, fcm_project_id: impl Into<String>) -> Self {
        let fcm_project_id = fcm_project_id.into();
        info!(project_id = %fcm_project_id, enabled = settings.enabled, "Push backend initialized");

        Self {
            settings,
            fcm_project_id,
        }
    }

    fn build_request(notification: &Notification) -> FcmRequest {
        let data = HashMap::from([(
            "notification_id".to_string(),
            notification.id().to_string(),
        )]);

        FcmRequest {
            message: FcmMessage {
                token: notification.recipient().to_string(),
                notification: FcmNotification {
                    title: notification.title().to_string(),
                    body: notification.message().to_string(),
                },
                data: Some(data),
            },
        }
    }
}

#[async_trait]
impl ChannelBackend for PushBackend {
    fn name(&self) -> &str {
        "push"
    }

    fn supported_types(&self) -> HashSet<ChannelType> {
        HashSet::from([ChannelType::Push])
    }

    fn validate_extra(&self, notification: &Notification) -> Result<()> {
        validate_fcm_token(notification.recipient())?;
        validate_max_chars("Push title", notification.title(), PUSH_TITLE_MAX_CHARS)?;

        if notification.message().len() > PUSH_BODY_MAX_BYTES {
            return Err(anyhow!(
                "Push body too large ({} bytes, maximum {})",
                notification.message().len(),
                PUSH_BODY_MAX_BYTES
            ));
        }

        Ok(())
    }

    async fn deliver(&self, notification: &Notification) -> Result<DeliveryReceipt> {
        let request = Self::build_request(notification);
        let payload_bytes = serde_json::to_vec(&request)?.len();

        debug!(
            device_token = notification.recipient(),
            payload_bytes,
            "Sending FCM push notification"
        );

        self.settings
            .simulate_call("Push", || {
                format!("FCM request failed: device {} unreachable", notification.recipient())
            })
            .await?;

        Ok(DeliveryReceipt::new()
            .with(
                "fcm_message_id",
                format!("projects/{}/messages/{}", self.fcm_project_id, Uuid::new_v4()),
            )
            .with("payload_bytes", payload_bytes))
    }

    async fn health_check(&self) -> Result<()> {
        self.settings.ensure_enabled("Push")?;

        if self.fcm_project_id.trim().is_empty() {
            return Err(anyhow!("FCM project id is not configured"));
        }

        Ok(())
    }
}
