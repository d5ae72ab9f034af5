use std::time::Duration;

use crate::channels::adapter::{ChannelError, ChannelType};

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("channel {channel} is unhealthy: {source}")]
    ChannelUnhealthy {
        channel: ChannelType,
        #[source]
        source: ChannelError,
    },
    #[error("channel {channel} health check timed out after {timeout:?}")]
    HealthcheckTimeout {
        channel: ChannelType,
        timeout: Duration,
    },
}
