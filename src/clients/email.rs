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
        validation::{EMAIL_SUBJECT_MAX_CHARS, validate_email_address, validate_max_chars},
    },
};

pub struct EmailBackend {
    settings: ProviderSettings,
    smtp_host: String,
    from_address: String,
}

impl EmailBackend {
    pub fn new(
        settings: ProviderSettings,
        smtp_host: impl Into<String>,
        from_address: impl Into<String>,
    ) -> Self {
        let smtp_host = smtp_host.into();
        info!(smtp_host = %smtp_host, enabled = settings.enabled, "Email backend initialized");

        Self {
            settings,
            smtp_host,
            from_address: from_address.into(),
        }
    }
}

#[async_trait]
impl ChannelBackend for EmailBackend {
    fn name(&self) -> &str {
        "email"
    }

    fn supported_types(&self) -> HashSet<ChannelType> {
        HashSet::from([ChannelType::Email])
    }

    fn validate_extra(&self, notification: &Notification) -> Result<()> {
        validate_email_address(notification.recipient())?;
        validate_max_chars("Subject", notification.title(), EMAIL_SUBJECT_MAX_CHARS)
    }

    async fn deliver(&self, notification: &Notification) -> Result<DeliveryReceipt> {
        debug!(
            recipient = notification.recipient(),
            smtp_host = %self.smtp_host,
            "Handing email to SMTP relay"
        );

        self.settings
            .simulate_call("Email", || {
                format!(
                    "SMTP delivery to {} timed out via {}",
                    notification.recipient(),
                    self.smtp_host
                )
            })
            .await?;

        Ok(DeliveryReceipt::new()
            .with("message_id", format!("<{}@{}>", Uuid::new_v4(), self.smtp_host))
            .with("smtp_host", self.smtp_host.clone())
            .with("from_address", self.from_address.clone()))
    }

    async fn health_check(&self) -> Result<()> {
        self.settings.ensure_enabled("Email")?;

        if self.smtp_host.trim().is_empty() {
            return Err(anyhow!("SMTP host is not configured"));
        }

        Ok(())
    }
}
