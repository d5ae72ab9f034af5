use async_trait::async_trait;

use crate::delivery::service::DeliveryService;
use crate::notifications::types::Notification;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Success,
    Failure(String),
}

/// Processes one batch. The returned outcomes must match the batch in
/// length and order; an `Err` means every item in the batch failed.
#[async_trait]
pub trait BatchHandler: Send + Sync {
    async fn handle(&self, batch: &[Notification]) -> anyhow::Result<Vec<ItemOutcome>>;
}

#[async_trait]
impl BatchHandler for DeliveryService {
    async fn handle(&self, batch: &[Notification]) -> anyhow::Result<Vec<ItemOutcome>> {
        let outcomes = self
            .send(batch)
            .await
            .into_iter()
            .map(|result| {
                if result.is_success() {
                    ItemOutcome::Success
                } else {
                    ItemOutcome::Failure(result.error.unwrap_or_else(|| "delivery failed".to_string()))
                }
            })
            .collect();
        Ok(outcomes)
    }
}
