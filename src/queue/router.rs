/// Maps a retry attempt count to the queue the message goes to next.
///
/// Only counts 1 and 2 are live retries; every other value, 0 and
/// negatives included, means the message is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryRouter {
    short_delay: String,
    long_delay: String,
    dead_letter: String,
}

impl RetryRouter {
    pub fn new(
        short_delay: impl Into<String>,
        long_delay: impl Into<String>,
        dead_letter: impl Into<String>,
    ) -> Self {
        Self {
            short_delay: short_delay.into(),
            long_delay: long_delay.into(),
            dead_letter: dead_letter.into(),
        }
    }

    pub fn route(&self, retry_count: i64) -> &str {
        match retry_count {
            1 => &self.short_delay,
            2 => &self.long_delay,
            _ => &self.dead_letter,
        }
    }

    pub fn short_delay(&self) -> &str {
        &self.short_delay
    }

    pub fn long_delay(&self) -> &str {
        &self.long_delay
    }

    pub fn is_dead_letter(&self, queue: &str) -> bool {
        queue == self.dead_letter
    }

    pub fn is_retry_queue(&self, queue: &str) -> bool {
        queue == self.short_delay || queue == self.long_delay
    }
}
