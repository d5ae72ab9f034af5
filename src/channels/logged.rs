use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::channels::adapter::{Channel, ChannelError, ChannelType};
use crate::notifications::types::Contact;

/// Observability wrapper. Emits one event per send and health probe and
/// returns the inner result untouched.
#[derive(Clone)]
pub struct LoggedChannel {
    inner: Arc<dyn Channel>,
}

impl LoggedChannel {
    pub fn wrap(inner: Arc<dyn Channel>) -> Arc<dyn Channel> {
        Arc::new(Self { inner })
    }
}

#[async_trait]
impl Channel for LoggedChannel {
    fn channel_type(&self) -> ChannelType {
        self.inner.channel_type()
    }

    fn supports(&self, contact: &Contact) -> bool {
        self.inner.supports(contact)
    }

    async fn send(&self, contact: &Contact, message: &str) -> Result<(), ChannelError> {
        let started = Instant::now();
        let result = self.inner.send(contact, message).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(()) => tracing::debug!(
                channel = %self.inner.channel_type(),
                contact = %contact,
                elapsed_ms,
                "channel send succeeded"
            ),
            Err(err) => tracing::warn!(
                channel = %self.inner.channel_type(),
                contact = %contact,
                elapsed_ms,
                error = %err,
                "channel send failed"
            ),
        }
        result
    }

    async fn check_health(&self) -> Result<(), ChannelError> {
        let result = self.inner.check_health().await;
        if let Err(err) = &result {
            tracing::warn!(
                channel = %self.inner.channel_type(),
                error = %err,
                "channel health probe failed"
            );
        }
        result
    }
}
