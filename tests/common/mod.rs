#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use courier::channels::adapter::{Channel, ChannelError, ChannelType};
use courier::notifications::types::{Contact, Notification, Strategy};

/// Channel double with a fixed verdict that counts its sends.
pub struct StubChannel {
    pub kind: ChannelType,
    pub supports_any: bool,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl StubChannel {
    pub fn ok(kind: ChannelType) -> Arc<Self> {
        Self::build(kind, true, false)
    }

    pub fn failing(kind: ChannelType) -> Arc<Self> {
        Self::build(kind, true, true)
    }

    pub fn unsupported(kind: ChannelType) -> Arc<Self> {
        Self::build(kind, false, false)
    }

    fn build(kind: ChannelType, supports_any: bool, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            kind,
            supports_any,
            fail,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Channel for StubChannel {
    fn channel_type(&self) -> ChannelType {
        self.kind
    }

    fn supports(&self, _contact: &Contact) -> bool {
        self.supports_any
    }

    async fn send(&self, _contact: &Contact, _message: &str) -> Result<(), ChannelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ChannelError::Transport(format!("{} is down", self.kind)));
        }
        Ok(())
    }
}

pub fn notification(id: &str) -> Notification {
    Notification {
        id: id.to_string(),
        created_at: chrono::Utc::now(),
        contacts: vec![Contact::Email("ops@example.com".to_string())],
        message: format!("message {id}"),
        is_immediate: false,
        strategy: Strategy::SendToFirstAvailable,
        subject: None,
    }
}

pub mod queues {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use courier::broker::{Broker, InMemoryBroker, NackOptions, QueueOptions};
    use courier::notifications::types::Notification;
    use courier::queue::envelope;
    use courier::queue::{
        BatchHandler, ConsumerError, ConsumerSettings, ErrorHook, ItemOutcome, Producer,
        RetryRouter,
    };

    pub const PRIMARY: &str = "notifications";
    pub const SHORT: &str = "notifications.retry.short";
    pub const LONG: &str = "notifications.retry.long";
    pub const DLQ: &str = "notifications.dlq";

    pub type Verdict = Box<dyn Fn(usize, &Notification) -> ItemOutcome + Send + Sync>;

    /// Records every batch it sees and answers per item through `verdict`,
    /// which receives the zero-based call number.
    pub struct ScriptedHandler {
        pub batches: Mutex<Vec<Vec<String>>>,
        verdict: Verdict,
        fail_call: Option<usize>,
    }

    impl ScriptedHandler {
        pub fn new(verdict: Verdict) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(Vec::new()),
                verdict,
                fail_call: None,
            })
        }

        pub fn failing_call(call: usize, verdict: Verdict) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(Vec::new()),
                verdict,
                fail_call: Some(call),
            })
        }

        pub fn batches(&self) -> Vec<Vec<String>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BatchHandler for ScriptedHandler {
        async fn handle(&self, batch: &[Notification]) -> anyhow::Result<Vec<ItemOutcome>> {
            let call = {
                let mut batches = self.batches.lock().unwrap();
                batches.push(batch.iter().map(|n| n.id.clone()).collect());
                batches.len() - 1
            };
            if self.fail_call == Some(call) {
                anyhow::bail!("handler exploded");
            }
            Ok(batch.iter().map(|n| (self.verdict)(call, n)).collect())
        }
    }

    pub fn succeed_all() -> Verdict {
        Box::new(|_: usize, _: &Notification| ItemOutcome::Success)
    }

    pub fn fail_ids(ids: &'static [&'static str]) -> Verdict {
        Box::new(move |_: usize, n: &Notification| {
            if ids.contains(&n.id.as_str()) {
                ItemOutcome::Failure(format!("{} bounced", n.id))
            } else {
                ItemOutcome::Success
            }
        })
    }

    pub struct Topology {
        pub broker: InMemoryBroker,
        pub producer: Arc<Producer>,
        pub router: RetryRouter,
    }

    impl Topology {
        pub async fn new() -> Self {
            let broker = InMemoryBroker::new();
            for queue in [PRIMARY, SHORT, LONG, DLQ] {
                broker
                    .declare_queue(queue, QueueOptions::default())
                    .await
                    .unwrap();
            }
            let shared: Arc<dyn Broker> = Arc::new(broker.clone());
            let producer = Arc::new(Producer::new(
                shared,
                PRIMARY,
                Duration::from_secs(1),
                Duration::from_secs(1),
            ));
            producer.start().await.unwrap();
            Self {
                broker,
                producer,
                router: RetryRouter::new(SHORT, LONG, DLQ),
            }
        }

        pub fn shared(&self) -> Arc<dyn Broker> {
            Arc::new(self.broker.clone())
        }

        pub async fn publish(&self, queue: &str, notification: &Notification, retry_count: i64) {
            let message = envelope::encode(notification, retry_count).unwrap();
            self.broker.publish(queue, message).await.unwrap();
        }

        /// `(id, retry_count)` for every message waiting on `queue`.
        pub async fn waiting(&self, queue: &str) -> Vec<(String, i64)> {
            self.broker
                .peek(queue)
                .await
                .iter()
                .map(|message| {
                    let envelope = envelope::decode(message).unwrap();
                    (envelope.notification.id, envelope.retry_count)
                })
                .collect()
        }
    }

    pub fn settings(queue: &str, max_batch_size: usize, flush_after: Duration) -> ConsumerSettings {
        ConsumerSettings {
            queue: queue.to_string(),
            max_batch_size,
            batch_flush_timeout: flush_after,
            nack: NackOptions::default(),
            healthcheck_timeout: Duration::from_millis(200),
        }
    }

    pub fn error_sink() -> (ErrorHook, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let hook: ErrorHook = Arc::new(move |err: &ConsumerError| {
            sink.lock().unwrap().push(err.to_string());
        });
        (hook, seen)
    }
}
