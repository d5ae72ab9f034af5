use std::sync::Arc;

use async_trait::async_trait;

use crate::channels::adapter::Channel;
use crate::notifications::result::{DeliveryResult, Warning};
use crate::notifications::types::{Contact, Notification, Strategy};

#[async_trait]
pub trait DeliveryStrategy: Send + Sync {
    async fn deliver(
        &self,
        channels: &[Arc<dyn Channel>],
        notification: &Notification,
    ) -> DeliveryResult;
}

/// Walks channels in priority order and stops at the first successful send.
#[derive(Debug, Default, Clone, Copy)]
pub struct SendToFirstAvailable;

/// Attempts every eligible channel concurrently; one success is enough.
#[derive(Debug, Default, Clone, Copy)]
pub struct SendToAllAvailable;

static FIRST_AVAILABLE: SendToFirstAvailable = SendToFirstAvailable;
static ALL_AVAILABLE: SendToAllAvailable = SendToAllAvailable;

pub fn strategy_for(strategy: Strategy) -> &'static dyn DeliveryStrategy {
    match strategy {
        Strategy::SendToFirstAvailable => &FIRST_AVAILABLE,
        Strategy::SendToAllAvailable => &ALL_AVAILABLE,
    }
}

fn eligible_contact<'a>(channel: &dyn Channel, notification: &'a Notification) -> Option<&'a Contact> {
    notification
        .contacts
        .iter()
        .find(|contact| channel.supports(contact))
}

fn warning(channel: &dyn Channel, contact: &Contact, error: impl ToString) -> Warning {
    Warning {
        channel: channel.channel_type(),
        contact: contact.clone(),
        error: error.to_string(),
    }
}

fn exhausted(notification: &Notification, attempts: usize, warnings: Vec<Warning>) -> DeliveryResult {
    let error = if attempts == 0 {
        "no configured channel supports any contact".to_string()
    } else {
        format!("all {attempts} delivery attempts failed")
    };
    DeliveryResult::failure(notification.clone(), error, warnings)
}

#[async_trait]
impl DeliveryStrategy for SendToFirstAvailable {
    async fn deliver(
        &self,
        channels: &[Arc<dyn Channel>],
        notification: &Notification,
    ) -> DeliveryResult {
        let mut warnings = Vec::new();
        let mut attempts = 0;
        for channel in channels {
            let Some(contact) = eligible_contact(channel.as_ref(), notification) else {
                continue;
            };
            attempts += 1;
            match channel.send(contact, &notification.message).await {
                Ok(()) => {
                    let details = format!("delivered via {} to {contact}", channel.channel_type());
                    return DeliveryResult::success(notification.clone(), details, warnings);
                }
                Err(err) => warnings.push(warning(channel.as_ref(), contact, err)),
            }
        }
        exhausted(notification, attempts, warnings)
    }
}

#[async_trait]
impl DeliveryStrategy for SendToAllAvailable {
    async fn deliver(
        &self,
        channels: &[Arc<dyn Channel>],
        notification: &Notification,
    ) -> DeliveryResult {
        let attempts = channels.iter().filter_map(|channel| {
            eligible_contact(channel.as_ref(), notification).map(|contact| async move {
                let result = channel.send(contact, &notification.message).await;
                (channel, contact, result)
            })
        });
        // join_all keeps channel priority order, so warnings are stable across runs.
        let outcomes = futures::future::join_all(attempts).await;

        let attempted = outcomes.len();
        let mut delivered = Vec::new();
        let mut warnings = Vec::new();
        for (channel, contact, result) in outcomes {
            match result {
                Ok(()) => delivered.push(channel.channel_type().to_string()),
                Err(err) => warnings.push(warning(channel.as_ref(), contact, err)),
            }
        }
        if delivered.is_empty() {
            return exhausted(notification, attempted, warnings);
        }
        let details = format!("delivered via {}", delivered.join(", "));
        DeliveryResult::success(notification.clone(), details, warnings)
    }
}
