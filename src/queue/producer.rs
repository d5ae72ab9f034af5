use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::broker::Broker;
use crate::queue::envelope;
use crate::queue::error::ProducerError;
use crate::notifications::types::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProducerState {
    Created,
    Started,
    Closed,
}

/// Publishes notifications onto broker queues. Publishes hold a read
/// lock on the lifecycle state, so `shutdown` waits for in-flight
/// publishes and every later publish fails with `Closed`.
pub struct Producer {
    broker: Arc<dyn Broker>,
    queue: String,
    publish_timeout: Duration,
    healthcheck_timeout: Duration,
    state: RwLock<ProducerState>,
}

impl Producer {
    pub fn new(
        broker: Arc<dyn Broker>,
        queue: impl Into<String>,
        publish_timeout: Duration,
        healthcheck_timeout: Duration,
    ) -> Self {
        Self {
            broker,
            queue: queue.into(),
            publish_timeout,
            healthcheck_timeout,
            state: RwLock::new(ProducerState::Created),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Pings the broker, bounded by the health check timeout, before
    /// marking the producer started. The state lock is not held meanwhile.
    pub async fn start(&self) -> Result<(), ProducerError> {
        match *self.state.read().await {
            ProducerState::Closed => return Err(ProducerError::Closed),
            ProducerState::Started => return Ok(()),
            ProducerState::Created => {}
        }
        self.ping().await?;
        let mut state = self.state.write().await;
        match *state {
            ProducerState::Closed => Err(ProducerError::Closed),
            ProducerState::Started => Ok(()),
            ProducerState::Created => {
                *state = ProducerState::Started;
                tracing::info!(queue = %self.queue, "producer started");
                Ok(())
            }
        }
    }

    /// Publishes fresh notifications to the ingestion queue.
    pub async fn publish(&self, items: &[Notification]) -> Result<(), ProducerError> {
        let state = self.state.read().await;
        ensure_started(*state)?;
        for notification in items {
            self.send(&self.queue, notification, 0).await?;
        }
        Ok(())
    }

    /// Publishes one notification to `queue` carrying `retry_count`.
    pub async fn publish_to(
        &self,
        queue: &str,
        notification: &Notification,
        retry_count: i64,
    ) -> Result<(), ProducerError> {
        let state = self.state.read().await;
        ensure_started(*state)?;
        self.send(queue, notification, retry_count).await
    }

    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        if *state != ProducerState::Closed {
            *state = ProducerState::Closed;
            tracing::info!(queue = %self.queue, "producer shut down");
        }
    }

    pub async fn check_health(&self) -> Result<(), ProducerError> {
        ensure_started(*self.state.read().await)?;
        self.ping().await
    }

    async fn ping(&self) -> Result<(), ProducerError> {
        tokio::time::timeout(self.healthcheck_timeout, self.broker.ping())
            .await
            .map_err(|_| ProducerError::HealthcheckTimeout(self.healthcheck_timeout))??;
        Ok(())
    }

    async fn send(
        &self,
        queue: &str,
        notification: &Notification,
        retry_count: i64,
    ) -> Result<(), ProducerError> {
        let message = envelope::encode(notification, retry_count)?;
        tokio::time::timeout(self.publish_timeout, self.broker.publish(queue, message))
            .await
            .map_err(|_| ProducerError::Timeout {
                queue: queue.to_string(),
                timeout: self.publish_timeout,
            })??;
        tracing::debug!(
            queue = %queue,
            notification_id = %notification.id,
            retry_count,
            "notification published"
        );
        Ok(())
    }
}

fn ensure_started(state: ProducerState) -> Result<(), ProducerError> {
    match state {
        ProducerState::Started => Ok(()),
        ProducerState::Created => Err(ProducerError::NotStarted),
        ProducerState::Closed => Err(ProducerError::Closed),
    }
}
