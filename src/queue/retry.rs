use std::sync::Arc;

use crate::broker::Broker;
use crate::queue::consumer::{BatchConsumer, ConsumerRole, ConsumerSettings, ErrorHook};
use crate::queue::error::ConsumerError;
use crate::queue::handler::BatchHandler;
use crate::queue::producer::Producer;
use crate::queue::router::RetryRouter;

/// Batch consumer bound to one of the delay queues. A failed item moves
/// on to the next retry queue, or to the dead-letter queue once the
/// router reports it exhausted, and is then acked here for good.
pub struct RetryConsumer {
    inner: BatchConsumer,
}

impl RetryConsumer {
    pub fn new(
        broker: Arc<dyn Broker>,
        producer: Arc<Producer>,
        router: RetryRouter,
        handler: Arc<dyn BatchHandler>,
        settings: ConsumerSettings,
    ) -> Result<Self, ConsumerError> {
        if !router.is_retry_queue(&settings.queue) {
            return Err(ConsumerError::NotARetryQueue(settings.queue));
        }
        Ok(Self {
            inner: BatchConsumer::with_role(
                broker,
                producer,
                router,
                handler,
                settings,
                ConsumerRole::Retry,
            ),
        })
    }

    pub fn with_error_hook(self, on_error: ErrorHook) -> Self {
        Self {
            inner: self.inner.with_error_hook(on_error),
        }
    }

    pub fn queue(&self) -> &str {
        self.inner.queue()
    }

    pub async fn start(&self) -> Result<(), ConsumerError> {
        self.inner.start().await
    }

    pub async fn shutdown(&self) {
        self.inner.shutdown().await
    }

    pub async fn check_health(&self) -> Result<(), ConsumerError> {
        self.inner.check_health().await
    }
}
