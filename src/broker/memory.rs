use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::broker::error::{BrokerError, BrokerResult};
use crate::broker::message::{Delivery, DeliveryTag, Message, NackOptions, QueueOptions};
use crate::broker::{Broker, DeliveryStream};

/// Process-local broker. Queues must be declared before use; delay
/// queues hold each message back for the declared delay.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    queues: DashMap<String, Arc<QueueSlot>>,
    next_tag: AtomicU64,
    unavailable: AtomicBool,
    closed: CancellationToken,
}

struct QueueSlot {
    options: QueueOptions,
    state: Mutex<QueueState>,
    notify: Notify,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Pending>,
    unacked: BTreeMap<u64, Message>,
}

struct Pending {
    message: Message,
    visible_at: Instant,
    redelivered: bool,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a lost connection: publish and ping fail while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn ready_len(&self, queue: &str) -> usize {
        match self.slot(queue) {
            Ok(slot) => slot.state.lock().await.ready.len(),
            Err(_) => 0,
        }
    }

    pub async fn unacked_len(&self, queue: &str) -> usize {
        match self.slot(queue) {
            Ok(slot) => slot.state.lock().await.unacked.len(),
            Err(_) => 0,
        }
    }

    /// Messages waiting on `queue`, delayed ones included.
    pub async fn peek(&self, queue: &str) -> Vec<Message> {
        match self.slot(queue) {
            Ok(slot) => slot
                .state
                .lock()
                .await
                .ready
                .iter()
                .map(|pending| pending.message.clone())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn slot(&self, queue: &str) -> BrokerResult<Arc<QueueSlot>> {
        self.inner
            .queues
            .get(queue)
            .map(|slot| Arc::clone(slot.value()))
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))
    }

    fn ensure_open(&self) -> BrokerResult<()> {
        if self.inner.closed.is_cancelled() {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }

    fn ensure_available(&self) -> BrokerResult<()> {
        self.ensure_open()?;
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

async fn next_delivery(inner: &Inner, slot: &QueueSlot, queue: &str) -> Option<Delivery> {
    loop {
        if inner.closed.is_cancelled() {
            return None;
        }
        let wake_at = {
            let mut state = slot.state.lock().await;
            let now = Instant::now();
            match state.ready.front().map(|pending| pending.visible_at) {
                Some(visible_at) if visible_at <= now => {
                    let pending = state.ready.pop_front()?;
                    let tag = inner.next_tag.fetch_add(1, Ordering::SeqCst) + 1;
                    state.unacked.insert(tag, pending.message.clone());
                    return Some(Delivery {
                        tag: DeliveryTag {
                            queue: queue.to_string(),
                            tag,
                        },
                        message: pending.message,
                        redelivered: pending.redelivered,
                    });
                }
                other => other,
            }
        };
        match wake_at {
            Some(at) => {
                tokio::select! {
                    _ = inner.closed.cancelled() => return None,
                    _ = slot.notify.notified() => {}
                    _ = tokio::time::sleep_until(at) => {}
                }
            }
            None => {
                tokio::select! {
                    _ = inner.closed.cancelled() => return None,
                    _ = slot.notify.notified() => {}
                }
            }
        }
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn declare_queue(&self, queue: &str, options: QueueOptions) -> BrokerResult<()> {
        self.ensure_available()?;
        self.inner
            .queues
            .entry(queue.to_string())
            .or_insert_with(|| {
                Arc::new(QueueSlot {
                    options,
                    state: Mutex::new(QueueState::default()),
                    notify: Notify::new(),
                })
            });
        Ok(())
    }

    async fn publish(&self, queue: &str, message: Message) -> BrokerResult<()> {
        self.ensure_available()?;
        let slot = self.slot(queue)?;
        let visible_at = match slot.options.delay {
            Some(delay) => Instant::now() + delay,
            None => Instant::now(),
        };
        slot.state.lock().await.ready.push_back(Pending {
            message,
            visible_at,
            redelivered: false,
        });
        slot.notify.notify_one();
        Ok(())
    }

    async fn consume(&self, queue: &str) -> BrokerResult<DeliveryStream> {
        self.ensure_available()?;
        let slot = self.slot(queue)?;
        let inner = Arc::clone(&self.inner);
        let queue = queue.to_string();
        let stream = futures::stream::unfold(
            (inner, slot, queue),
            |(inner, slot, queue)| async move {
                let delivery = next_delivery(&inner, &slot, &queue).await?;
                Some((delivery, (inner, slot, queue)))
            },
        );
        Ok(Box::pin(stream))
    }

    async fn ack(&self, tag: &DeliveryTag) -> BrokerResult<()> {
        self.ensure_open()?;
        let slot = self.slot(&tag.queue)?;
        let mut state = slot.state.lock().await;
        state
            .unacked
            .remove(&tag.tag)
            .map(|_| ())
            .ok_or_else(|| BrokerError::UnknownDeliveryTag {
                queue: tag.queue.clone(),
                tag: tag.tag,
            })
    }

    async fn nack(&self, tag: &DeliveryTag, options: NackOptions) -> BrokerResult<()> {
        self.ensure_open()?;
        let slot = self.slot(&tag.queue)?;
        let mut state = slot.state.lock().await;
        if !state.unacked.contains_key(&tag.tag) {
            return Err(BrokerError::UnknownDeliveryTag {
                queue: tag.queue.clone(),
                tag: tag.tag,
            });
        }
        let tags: Vec<u64> = if options.multiple {
            state.unacked.range(..=tag.tag).map(|(tag, _)| *tag).collect()
        } else {
            vec![tag.tag]
        };
        let mut released = Vec::with_capacity(tags.len());
        for tag in tags {
            if let Some(message) = state.unacked.remove(&tag) {
                released.push(message);
            }
        }
        if options.requeue {
            let now = Instant::now();
            for message in released.into_iter().rev() {
                state.ready.push_front(Pending {
                    message,
                    visible_at: now,
                    redelivered: true,
                });
            }
            drop(state);
            slot.notify.notify_one();
        }
        Ok(())
    }

    async fn ping(&self) -> BrokerResult<()> {
        self.ensure_available()
    }

    async fn close(&self) {
        self.inner.closed.cancel();
    }
}
