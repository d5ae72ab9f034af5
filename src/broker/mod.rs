pub mod error;
pub mod memory;
pub mod message;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

pub use error::{BrokerError, BrokerResult};
pub use memory::InMemoryBroker;
pub use message::{Delivery, DeliveryTag, Message, NackOptions, QueueOptions};

pub type DeliveryStream = Pin<Box<dyn Stream<Item = Delivery> + Send>>;

/// Queue broker as seen by producers and consumers. A consumption
/// stream ends when the broker connection closes.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn declare_queue(&self, queue: &str, options: QueueOptions) -> BrokerResult<()>;
    async fn publish(&self, queue: &str, message: Message) -> BrokerResult<()>;
    async fn consume(&self, queue: &str) -> BrokerResult<DeliveryStream>;
    async fn ack(&self, tag: &DeliveryTag) -> BrokerResult<()>;
    async fn nack(&self, tag: &DeliveryTag, options: NackOptions) -> BrokerResult<()>;
    async fn ping(&self) -> BrokerResult<()>;
    async fn close(&self);
}
