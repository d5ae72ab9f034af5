use serde::Serialize;

use crate::channels::adapter::ChannelType;
use crate::notifications::types::{Contact, Notification};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Success,
    Failure,
}

/// One contact attempt that did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub channel: ChannelType,
    pub contact: Contact,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub status: DeliveryStatus,
    pub notification: Notification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl DeliveryResult {
    pub fn success(notification: Notification, details: String, warnings: Vec<Warning>) -> Self {
        Self {
            status: DeliveryStatus::Success,
            notification,
            details: Some(details),
            error: None,
            warnings,
        }
    }

    pub fn failure(notification: Notification, error: String, warnings: Vec<Warning>) -> Self {
        Self {
            status: DeliveryStatus::Failure,
            notification,
            details: None,
            error: Some(error),
            warnings,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Success
    }
}
