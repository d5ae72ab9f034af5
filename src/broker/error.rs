#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    #[error("broker connection is closed")]
    Closed,
    #[error("queue '{0}' is not declared")]
    UnknownQueue(String),
    #[error("unknown delivery tag {tag} on queue '{queue}'")]
    UnknownDeliveryTag { queue: String, tag: u64 },
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

pub type BrokerResult<T> = Result<T, BrokerError>;
