use std::collections::{BTreeMap, HashMap};

use futures_util::{
    FutureExt,
    future::{self, join_all},
};
use tracing::{debug, error, info, warn};

use crate::{
    clients::service::{ChannelService, DeliveryFuture},
    error::{NotificationError, Result},
    models::{
        channel::ChannelType,
        health::HealthCheckResponse,
        notification::{Notification, NotificationHandle},
    },
};

pub const FALLBACK_FROM_KEY: &str = "fallback_from";

/// What happened on one channel of a fan-out or fallback chain.
#[derive(Debug, Clone)]
pub struct ChannelOutcome {
    pub channel_type: ChannelType,
    /// The per-channel notification, absent when no recipient was supplied.
    pub notification: Option<NotificationHandle>,
    pub sent: bool,
}

impl ChannelOutcome {
    fn skipped(channel_type: ChannelType) -> Self {
        Self {
            channel_type,
            notification: None,
            sent: false,
        }
    }
}

/// Routes notifications to the channel service registered for their type.
#[derive(Clone, Default)]
pub struct CompositeDispatcher {
    services: HashMap<ChannelType, ChannelService>,
}

impl CompositeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails when the service does not declare support for `channel_type`.
    pub fn register(&mut self, channel_type: ChannelType, service: ChannelService) -> Result<()> {
        if !service.supports_notification_type(channel_type) {
            return Err(NotificationError::configuration(format!(
                "Backend {} does not support channel type {}",
                service.name(),
                channel_type
            )));
        }

        info!(channel = %channel_type, backend = service.name(), "Channel service registered");

        if let Some(previous) = self.services.insert(channel_type, service) {
            warn!(
                channel = %channel_type,
                replaced = previous.name(),
                "Replaced previously registered channel service"
            );
        }

        Ok(())
    }

    /// Registers `service` for every type it supports.
    pub fn with_service(mut self, service: ChannelService) -> Result<Self> {
        let mut types: Vec<_> = service.supported_types().into_iter().collect();
        types.sort();

        for channel_type in types {
            self.register(channel_type, service.clone())?;
        }

        Ok(self)
    }

    pub fn service(&self, channel_type: ChannelType) -> Result<&ChannelService> {
        self.services
            .get(&channel_type)
            .ok_or(NotificationError::UnsupportedChannel(channel_type))
    }

    pub fn registered_types(&self) -> Vec<ChannelType> {
        let mut types: Vec<_> = self.services.keys().copied().collect();
        types.sort();
        types
    }

    /// Strict variant of [`send_notification`](Self::send_notification): a
    /// missing backend or an illegal transition comes back as an error.
    pub async fn dispatch(&self, handle: &NotificationHandle) -> Result<bool> {
        let channel_type = handle.lock().channel_type();
        self.service(channel_type)?.deliver(handle).await
    }

    pub async fn send_notification(&self, handle: &NotificationHandle) -> bool {
        match self.dispatch(handle).await {
            Ok(sent) => sent,
            Err(NotificationError::UnsupportedChannel(channel_type)) => {
                error!(
                    notification_id = %handle.id(),
                    channel = %channel_type,
                    "No channel service registered, notification not routed"
                );
                false
            }
            Err(e) => {
                error!(notification_id = %handle.id(), error = %e, "Dispatch aborted");
                false
            }
        }
    }

    pub fn send_notification_async(&self, handle: NotificationHandle) -> DeliveryFuture<bool> {
        let channel_type = handle.lock().channel_type();

        match self.service(channel_type) {
            Ok(service) => service.send_notification_async(handle),
            Err(e) => {
                error!(notification_id = %handle.id(), error = %e, "Dispatch aborted");
                future::ready(false).boxed()
            }
        }
    }

    pub async fn send_notifications(&self, handles: &[NotificationHandle]) -> Vec<bool> {
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(self.send_notification(handle).await);
        }
        results
    }

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

    /// Sends the content of `template` to each of `types` in turn, addressed
    /// to that channel's entry in `recipients`. Outcomes follow `types` order.
    pub async fn fan_out(
        &self,
        template: &Notification,
        recipients: &HashMap<ChannelType, String>,
        types: &[ChannelType],
    ) -> Vec<ChannelOutcome> {
        let mut outcomes = Vec::with_capacity(types.len());

        for &channel_type in types {
            let Some(handle) = Self::derive(template, recipients, channel_type, None) else {
                outcomes.push(ChannelOutcome::skipped(channel_type));
                continue;
            };

            let sent = self.send_notification(&handle).await;
            outcomes.push(ChannelOutcome {
                channel_type,
                notification: Some(handle),
                sent,
            });
        }

        outcomes
    }

    pub async fn send_to_multiple_channels(
        &self,
        template: &Notification,
        recipients: &HashMap<ChannelType, String>,
        types: &[ChannelType],
    ) -> Vec<bool> {
        self.fan_out(template, recipients, types)
            .await
            .into_iter()
            .map(|outcome| outcome.sent)
            .collect()
    }

    /// Every channel attempt runs concurrently on the worker pool; the future
    /// resolves once all of them have, in `types` order.
    pub fn send_to_multiple_channels_async(
        &self,
        template: &Notification,
        recipients: &HashMap<ChannelType, String>,
        types: &[ChannelType],
    ) -> DeliveryFuture<Vec<bool>> {
        let attempts: Vec<DeliveryFuture<bool>> = types
            .iter()
            .map(
                |&channel_type| match Self::derive(template, recipients, channel_type, None) {
                    Some(handle) => self.send_notification_async(handle),
                    None => future::ready(false).boxed(),
                },
            )
            .collect();

        join_all(attempts).boxed()
    }

    /// Tries `primary`, then each fallback in order until one succeeds.
    /// Returns every attempt made, skipped channels included.
    pub async fn fallback_chain(
        &self,
        template: &Notification,
        recipients: &HashMap<ChannelType, String>,
        primary: ChannelType,
        fallbacks: &[ChannelType],
    ) -> Vec<ChannelOutcome> {
        let mut outcomes = Vec::with_capacity(fallbacks.len() + 1);

        for (position, &channel_type) in std::iter::once(&primary).chain(fallbacks).enumerate() {
            let fallback_from = (position > 0).then_some(primary);

            let Some(handle) = Self::derive(template, recipients, channel_type, fallback_from)
            else {
                debug!(channel = %channel_type, "No recipient for channel, skipping");
                outcomes.push(ChannelOutcome::skipped(channel_type));
                continue;
            };

            if fallback_from.is_some() {
                info!(
                    primary = %primary,
                    fallback = %channel_type,
                    "Falling back to alternate channel"
                );
            }

            let sent = self.send_notification(&handle).await;
            outcomes.push(ChannelOutcome {
                channel_type,
                notification: Some(handle),
                sent,
            });

            if sent {
                break;
            }
        }

        outcomes
    }

    pub async fn send_with_fallback(
        &self,
        template: &Notification,
        recipients: &HashMap<ChannelType, String>,
        primary: ChannelType,
        fallbacks: &[ChannelType],
    ) -> bool {
        let outcomes = self
            .fallback_chain(template, recipients, primary, fallbacks)
            .await;

        let sent = outcomes.last().is_some_and(|outcome| outcome.sent);
        if !sent {
            warn!(primary = %primary, "Primary and all fallback channels failed");
        }
        sent
    }

    /// True while at least one registered backend is healthy.
    pub async fn is_healthy(&self) -> bool {
        for service in self.services.values() {
            if service.is_healthy().await {
                return true;
            }
        }
        false
    }

    pub async fn get_health_report(&self) -> HealthCheckResponse {
        let mut checks = BTreeMap::new();
        for (channel_type, service) in &self.services {
            checks.insert(*channel_type, service.health().await);
        }
        HealthCheckResponse::from_checks(checks)
    }

    pub async fn test_all_connections(&self) -> BTreeMap<ChannelType, bool> {
        let mut results = BTreeMap::new();
        for (channel_type, service) in &self.services {
            results.insert(*channel_type, service.test_connection().await);
        }
        results
    }

    fn derive(
        template: &Notification,
        recipients: &HashMap<ChannelType, String>,
        channel_type: ChannelType,
        fallback_from: Option<ChannelType>,
    ) -> Option<NotificationHandle> {
        let recipient = recipients.get(&channel_type)?;
        let mut notification = template.derive_for_channel(channel_type, recipient.clone());

        if let Some(primary) = fallback_from {
            notification.insert_metadata(FALLBACK_FROM_KEY, primary.code());
        }

        Some(NotificationHandle::new(notification))
    }
}
