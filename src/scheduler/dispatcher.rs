use std::sync::{Arc, Mutex, PoisonError};

use crate::delivery::service::DeliveryService;
use crate::notifications::result::DeliveryResult;
use crate::notifications::types::Notification;
use crate::scheduler::buffer::Buffer;

/// Broker-less ingestion: immediate notifications go straight to the
/// delivery service, everything else waits in memory for the next
/// scheduler tick.
pub struct BufferedDispatcher {
    buffer: Mutex<Buffer<Notification>>,
    delivery: Arc<DeliveryService>,
}

impl BufferedDispatcher {
    pub fn new(delivery: Arc<DeliveryService>) -> Self {
        Self {
            buffer: Mutex::new(Buffer::new()),
            delivery,
        }
    }

    /// Returns the results of the notifications delivered right away.
    pub async fn ingest(&self, notifications: Vec<Notification>) -> Vec<DeliveryResult> {
        let (immediate, deferred): (Vec<_>, Vec<_>) = notifications
            .into_iter()
            .partition(|notification| notification.is_immediate);
        if !deferred.is_empty() {
            tracing::debug!(buffered = deferred.len(), "buffering notifications");
            self.lock().append(deferred);
        }
        if immediate.is_empty() {
            return Vec::new();
        }
        self.delivery.send(&immediate).await
    }

    pub async fn flush(&self) -> Vec<DeliveryResult> {
        let batch = self.lock().take_all();
        if batch.is_empty() {
            return Vec::new();
        }
        tracing::info!(batch_size = batch.len(), "flushing buffered notifications");
        self.delivery.send(&batch).await
    }

    /// Scheduler entry point: a flush with any failed delivery is an error.
    pub async fn flush_task(&self) -> anyhow::Result<()> {
        let results = self.flush().await;
        let failed = results.iter().filter(|result| !result.is_success()).count();
        if failed > 0 {
            anyhow::bail!("{failed} of {} buffered notifications failed", results.len());
        }
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Buffer<Notification>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
