use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::notifications::types::Contact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Email,
    Bitrix,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Email => "email",
            ChannelType::Bitrix => "bitrix",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "email" => Some(ChannelType::Email),
            "bitrix" => Some(ChannelType::Bitrix),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("contact {0} is not supported by this channel")]
    Unsupported(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rejected by remote: {0}")]
    Rejected(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A delivery medium. Implementations are long-lived and shared; any
/// mutable state belongs to their own I/O client.
#[async_trait]
pub trait Channel: Send + Sync {
    fn channel_type(&self) -> ChannelType;

    fn supports(&self, contact: &Contact) -> bool {
        contact.channel_type() == self.channel_type()
    }

    async fn send(&self, contact: &Contact, message: &str) -> Result<(), ChannelError>;

    async fn check_health(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
