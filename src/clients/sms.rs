use std::collections::HashSet;

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
        notification::Notification,
        validation::{SMS_MESSAGE_MAX_CHARS, sms_segments, validate_max_chars, validate_phone_number},
    },
};

pub struct SmsBackend {
    settings: ProviderSettings,
    gateway_url: String,
    api_key: String,
    sender_id: String,
    cost_per_segment: f64,
}

impl SmsBackend {
    pub fn new(
        settings: ProviderSettings,
        gateway_url: impl Into<String>,
        api_key: impl Into<String>,
        sender_id: impl Into<String>,
        cost_per_segment: f64,
    ) -> Self {
        let gateway_url = gateway_url.into();
        info!(gateway_url = %gateway_url, enabled = settings.enabled, "SMS backend initialized");

        Self {
            settings,
            gateway_url,
            api_key: api_key.into(),
            sender_id: sender_id.into(),
            cost_per_segment,
        }
    }
}

#[async_trait]
impl ChannelBackend for SmsBackend {
    fn name(&self) -> &str {
        "sms"
    }

    fn supported_types(&self) -> HashSet<ChannelType> {
        HashSet::from([ChannelType::Sms])
    }

    fn validate_extra(&self, notification: &Notification) -> Result<()> {
        validate_phone_number(notification.recipient())?;
        validate_max_chars("SMS message", notification.message(), SMS_MESSAGE_MAX_CHARS)
    }

    async fn deliver(&self, notification: &Notification) -> Result<DeliveryReceipt> {
        let segments = sms_segments(notification.message());
        debug!(
            recipient = notification.recipient(),
            segments,
            "Submitting SMS to gateway"
        );

        self.settings
            .simulate_call("SMS", || {
                format!(
                    "SMS gateway {} rejected message to {}",
                    self.gateway_url,
                    notification.recipient()
                )
            })
            .await?;

        Ok(DeliveryReceipt::new()
            .with("message_sid", format!("SM{}", Uuid::new_v4().simple()))
            .with("segments", segments)
            .with("cost", segments as f64 * self.cost_per_segment)
            .with("sender_id", self.sender_id.clone()))
    }

    async fn health_check(&self) -> Result<()> {
        self.settings.ensure_enabled("SMS")?;

        if self.gateway_url.trim().is_empty() {
            return Err(anyhow!("SMS gateway URL is not configured"));
        }

        if self.api_key.trim().is_empty() {
            return Err(anyhow!("SMS API key is not configured"));
        }

        Ok(())
    }
}
