use std::sync::Arc;
use std::time::Duration;

use crate::channels::adapter::Channel;
use crate::delivery::error::DeliveryError;
use crate::delivery::strategy::strategy_for;
use crate::notifications::result::DeliveryResult;
use crate::notifications::types::Notification;

#[derive(Clone)]
pub struct DeliveryService {
    channels: Vec<Arc<dyn Channel>>,
    health_timeout: Duration,
}

impl DeliveryService {
    /// `channels` are in priority order, highest first.
    pub fn new(channels: Vec<Arc<dyn Channel>>, health_timeout: Duration) -> Self {
        Self {
            channels,
            health_timeout,
        }
    }

    /// One result per input, in input order. Never fails as a whole: a
    /// notification that cannot be delivered yields a failure result.
    pub async fn send(&self, notifications: &[Notification]) -> Vec<DeliveryResult> {
        let deliveries = notifications
            .iter()
            .map(|notification| self.send_one(notification));
        futures::future::join_all(deliveries).await
    }

    async fn send_one(&self, notification: &Notification) -> DeliveryResult {
        if notification.contacts.is_empty() {
            tracing::warn!(
                notification_id = %notification.id,
                "notification without contacts"
            );
            return DeliveryResult::failure(
                notification.clone(),
                "notification has no contacts".to_string(),
                Vec::new(),
            );
        }
        let result = strategy_for(notification.strategy)
            .deliver(&self.channels, notification)
            .await;
        if result.is_success() {
            tracing::debug!(
                notification_id = %notification.id,
                strategy = ?notification.strategy,
                warnings = result.warnings.len(),
                "notification delivered"
            );
        } else {
            tracing::warn!(
                notification_id = %notification.id,
                strategy = ?notification.strategy,
                error = result.error.as_deref().unwrap_or_default(),
                warnings = result.warnings.len(),
                "notification delivery failed"
            );
        }
        result
    }

    /// Probes every channel concurrently; the first unhealthy channel in
    /// priority order is reported.
    pub async fn check_health(&self) -> Result<(), DeliveryError> {
        let probes = self.channels.iter().map(|channel| async move {
            let channel_type = channel.channel_type();
            match tokio::time::timeout(self.health_timeout, channel.check_health()).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(source)) => Err(DeliveryError::ChannelUnhealthy {
                    channel: channel_type,
                    source,
                }),
                Err(_) => Err(DeliveryError::HealthcheckTimeout {
                    channel: channel_type,
                    timeout: self.health_timeout,
                }),
            }
        });
        futures::future::join_all(probes)
            .await
            .into_iter()
            .collect::<Result<Vec<()>, _>>()
            .map(|_| ())
    }
}
