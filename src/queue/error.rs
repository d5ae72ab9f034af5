use std::time::Duration;

use crate::broker::error::BrokerError;

#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("producer has not been started")]
    NotStarted,
    #[error("producer is shut down")]
    Closed,
    #[error("publish to '{queue}' timed out after {timeout:?}")]
    Timeout { queue: String, timeout: Duration },
    #[error("health check timed out after {0:?}")]
    HealthcheckTimeout(Duration),
    #[error("failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("consumer for '{0}' is already started")]
    AlreadyStarted(String),
    #[error("'{0}' is not a retry queue")]
    NotARetryQueue(String),
    #[error("undecodable message on '{queue}' (tag {tag}): {reason}")]
    Decode {
        queue: String,
        tag: u64,
        reason: String,
    },
    #[error("batch handler failed: {0}")]
    Handler(String),
    #[error("batch handler returned {actual} results for {expected} items")]
    HandlerMismatch { expected: usize, actual: usize },
    #[error("failed to republish notification {notification_id}: {source}")]
    Republish {
        notification_id: String,
        #[source]
        source: ProducerError,
    },
    #[error("delivery stream for '{0}' ended")]
    StreamEnded(String),
    #[error("health check timed out after {0:?}")]
    HealthcheckTimeout(Duration),
    #[error(transparent)]
    Broker(#[from] BrokerError),
}
