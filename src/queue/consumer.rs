use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::broker::message::{Delivery, DeliveryTag, NackOptions};
use crate::broker::{Broker, DeliveryStream};
use crate::config::BrokerConfig;
use crate::notifications::types::Notification;
use crate::queue::envelope::{self, Envelope};
use crate::queue::error::ConsumerError;
use crate::queue::handler::{BatchHandler, ItemOutcome};
use crate::queue::producer::Producer;
use crate::queue::router::RetryRouter;

pub type ErrorHook = Arc<dyn Fn(&ConsumerError) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub queue: String,
    pub max_batch_size: usize,
    pub batch_flush_timeout: Duration,
    pub nack: NackOptions,
    pub healthcheck_timeout: Duration,
}

impl ConsumerSettings {
    pub fn from_config(config: &BrokerConfig, queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            max_batch_size: config.max_batch_size(),
            batch_flush_timeout: Duration::from_millis(config.batch_flush_timeout_ms()),
            nack: config.nack_options(),
            healthcheck_timeout: Duration::from_millis(config.healthcheck_timeout_ms()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConsumerRole {
    Primary,
    Retry,
}

impl ConsumerRole {
    fn as_str(&self) -> &'static str {
        match self {
            ConsumerRole::Primary => "primary",
            ConsumerRole::Retry => "retry",
        }
    }
}

#[derive(Clone)]
struct ConsumerCore {
    broker: Arc<dyn Broker>,
    producer: Arc<Producer>,
    router: RetryRouter,
    handler: Arc<dyn BatchHandler>,
    settings: ConsumerSettings,
    role: ConsumerRole,
    on_error: ErrorHook,
}

struct BatchItem {
    tag: DeliveryTag,
    envelope: Envelope,
}

/// Turns a broker subscription into handler batches and settles every
/// message with exactly one ack or nack.
///
/// A batch is flushed when it reaches `max_batch_size` or when
/// `batch_flush_timeout` has passed since its first message, whichever
/// comes first. Items the handler fails are republished to the queue the
/// [`RetryRouter`] picks for their next attempt and then acked; if that
/// republish fails the original is nacked so the broker redelivers it.
pub struct BatchConsumer {
    core: Arc<ConsumerCore>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BatchConsumer {
    pub fn new(
        broker: Arc<dyn Broker>,
        producer: Arc<Producer>,
        router: RetryRouter,
        handler: Arc<dyn BatchHandler>,
        settings: ConsumerSettings,
    ) -> Self {
        Self::with_role(
            broker,
            producer,
            router,
            handler,
            settings,
            ConsumerRole::Primary,
        )
    }

    pub(crate) fn with_role(
        broker: Arc<dyn Broker>,
        producer: Arc<Producer>,
        router: RetryRouter,
        handler: Arc<dyn BatchHandler>,
        settings: ConsumerSettings,
        role: ConsumerRole,
    ) -> Self {
        let on_error: ErrorHook = Arc::new(|err: &ConsumerError| {
            tracing::error!(error = %err, "consumer error");
        });
        Self {
            core: Arc::new(ConsumerCore {
                broker,
                producer,
                router,
                handler,
                settings,
                role,
                on_error,
            }),
            shutdown: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Replaces the infrastructure error callback. Call before `start`.
    pub fn with_error_hook(self, on_error: ErrorHook) -> Self {
        let mut core = self.core.as_ref().clone();
        core.on_error = on_error;
        Self {
            core: Arc::new(core),
            shutdown: self.shutdown,
            task: self.task,
        }
    }

    pub fn queue(&self) -> &str {
        &self.core.settings.queue
    }

    pub async fn start(&self) -> Result<(), ConsumerError> {
        let mut task = self.task.lock().await;
        if task.is_some() || self.shutdown.is_cancelled() {
            return Err(ConsumerError::AlreadyStarted(self.queue().to_string()));
        }
        let timeout = self.core.settings.healthcheck_timeout;
        let stream = tokio::time::timeout(timeout, self.core.broker.consume(self.queue()))
            .await
            .map_err(|_| ConsumerError::HealthcheckTimeout(timeout))??;
        let core = Arc::clone(&self.core);
        let shutdown = self.shutdown.clone();
        *task = Some(tokio::spawn(async move {
            core.run(stream, shutdown).await;
        }));
        tracing::info!(
            queue = %self.queue(),
            role = self.core.role.as_str(),
            max_batch_size = self.core.settings.max_batch_size,
            "consumer started"
        );
        Ok(())
    }

    /// Stops taking deliveries, flushes the partial batch and waits for
    /// the handler call in flight to settle.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            tracing::error!(queue = %self.queue(), error = %err, "consumer task aborted");
        }
        tracing::info!(queue = %self.queue(), "consumer stopped");
    }

    pub async fn check_health(&self) -> Result<(), ConsumerError> {
        let timeout = self.core.settings.healthcheck_timeout;
        tokio::time::timeout(timeout, self.core.broker.ping())
            .await
            .map_err(|_| ConsumerError::HealthcheckTimeout(timeout))??;
        Ok(())
    }
}

impl ConsumerCore {
    async fn run(&self, mut stream: DeliveryStream, shutdown: CancellationToken) {
        let mut batch: Vec<Delivery> = Vec::with_capacity(self.settings.max_batch_size);
        let mut deadline: Option<Instant> = None;
        loop {
            let flush_at = deadline;
            let timer = async move {
                match flush_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = timer => {
                    deadline = None;
                    self.flush(std::mem::take(&mut batch)).await;
                }
                next = stream.next() => match next {
                    Some(delivery) => {
                        if batch.is_empty() {
                            deadline = Some(Instant::now() + self.settings.batch_flush_timeout);
                        }
                        batch.push(delivery);
                        if batch.len() >= self.settings.max_batch_size {
                            deadline = None;
                            self.flush(std::mem::take(&mut batch)).await;
                        }
                    }
                    None => {
                        if !shutdown.is_cancelled() {
                            self.report(&ConsumerError::StreamEnded(self.settings.queue.clone()));
                        }
                        break;
                    }
                },
            }
        }
        drop(stream);
        if !batch.is_empty() {
            self.flush(batch).await;
        }
    }

    async fn flush(&self, deliveries: Vec<Delivery>) {
        let mut items = Vec::with_capacity(deliveries.len());
        for delivery in deliveries {
            match envelope::decode(&delivery.message) {
                Ok(envelope) => items.push(BatchItem {
                    tag: delivery.tag,
                    envelope,
                }),
                Err(err) => {
                    self.report(&ConsumerError::Decode {
                        queue: delivery.tag.queue.clone(),
                        tag: delivery.tag.tag,
                        reason: err.to_string(),
                    });
                    let poison = NackOptions {
                        requeue: false,
                        multiple: false,
                    };
                    self.nack(&delivery.tag, poison).await;
                }
            }
        }
        if items.is_empty() {
            return;
        }

        tracing::debug!(
            queue = %self.settings.queue,
            batch_size = items.len(),
            "flushing batch"
        );
        let notifications: Vec<Notification> = items
            .iter()
            .map(|item| item.envelope.notification.clone())
            .collect();
        let outcomes = self.invoke_handler(notifications).await;
        for (item, outcome) in items.into_iter().zip(outcomes) {
            match outcome {
                ItemOutcome::Success => self.ack(&item.tag).await,
                ItemOutcome::Failure(reason) => self.reroute(item, &reason).await,
            }
        }
    }

    /// Runs the handler on its own task so a panic is contained. Any
    /// whole-batch failure turns into a failure for every item.
    async fn invoke_handler(&self, notifications: Vec<Notification>) -> Vec<ItemOutcome> {
        let expected = notifications.len();
        let handler = Arc::clone(&self.handler);
        let joined = tokio::spawn(async move { handler.handle(&notifications).await }).await;
        let reason = match joined {
            Ok(Ok(outcomes)) if outcomes.len() == expected => return outcomes,
            Ok(Ok(outcomes)) => {
                let err = ConsumerError::HandlerMismatch {
                    expected,
                    actual: outcomes.len(),
                };
                let reason = err.to_string();
                self.report(&err);
                reason
            }
            Ok(Err(err)) => {
                let err = ConsumerError::Handler(err.to_string());
                let reason = err.to_string();
                self.report(&err);
                reason
            }
            Err(join_err) => {
                let err = ConsumerError::Handler(format!("handler panicked: {join_err}"));
                let reason = err.to_string();
                self.report(&err);
                reason
            }
        };
        vec![ItemOutcome::Failure(reason); expected]
    }

    /// Routes on `carried + 1`, so a fresh message (count 0) lands on the
    /// short-delay queue.
    async fn reroute(&self, item: BatchItem, reason: &str) {
        let notification = &item.envelope.notification;
        let next = item.envelope.retry_count.saturating_add(1);
        let target = self.router.route(next);
        match self.producer.publish_to(target, notification, next).await {
            Ok(()) => {
                if self.router.is_dead_letter(target) {
                    tracing::warn!(
                        queue = %self.settings.queue,
                        role = self.role.as_str(),
                        notification_id = %notification.id,
                        retry_count = next,
                        reason,
                        "notification dead-lettered"
                    );
                } else {
                    tracing::info!(
                        queue = %self.settings.queue,
                        target = %target,
                        notification_id = %notification.id,
                        retry_count = next,
                        reason,
                        "notification scheduled for retry"
                    );
                }
                self.ack(&item.tag).await;
            }
            Err(source) => {
                self.report(&ConsumerError::Republish {
                    notification_id: notification.id.clone(),
                    source,
                });
                self.nack(&item.tag, self.settings.nack).await;
            }
        }
    }

    async fn ack(&self, tag: &DeliveryTag) {
        if let Err(err) = self.broker.ack(tag).await {
            self.report(&ConsumerError::Broker(err));
        }
    }

    async fn nack(&self, tag: &DeliveryTag, options: NackOptions) {
        if let Err(err) = self.broker.nack(tag, options).await {
            self.report(&ConsumerError::Broker(err));
        }
    }

    fn report(&self, err: &ConsumerError) {
        (self.on_error)(err);
    }
}
