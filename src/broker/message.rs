use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl Message {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            headers: HashMap::new(),
        }
    }

    pub fn with_retry_count(mut self, retry_count: i64) -> Self {
        self.headers
            .insert(RETRY_COUNT_HEADER.to_string(), retry_count.to_string());
        self
    }

    /// Missing or unparseable counts read as 0.
    pub fn retry_count(&self) -> i64 {
        self.headers
            .get(RETRY_COUNT_HEADER)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryTag {
    pub queue: String,
    pub tag: u64,
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: DeliveryTag,
    pub message: Message,
    pub redelivered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NackOptions {
    pub requeue: bool,
    pub multiple: bool,
}

impl Default for NackOptions {
    fn default() -> Self {
        Self {
            requeue: true,
            multiple: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueOptions {
    /// Messages become visible to consumers only after this delay.
    pub delay: Option<Duration>,
}
