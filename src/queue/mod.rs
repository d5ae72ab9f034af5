pub mod consumer;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod producer;
pub mod retry;
pub mod router;

pub use consumer::{BatchConsumer, ConsumerSettings, ErrorHook};
pub use error::{ConsumerError, ProducerError};
pub use handler::{BatchHandler, ItemOutcome};
pub use producer::Producer;
pub use retry::RetryConsumer;
pub use router::RetryRouter;
