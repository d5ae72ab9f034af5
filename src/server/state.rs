use std::sync::Arc;

use crate::config::ServerConfig;
use crate::health::HealthCheck;
use crate::notifications::types::Notification;
use crate::queue::error::ProducerError;
use crate::queue::producer::Producer;
use crate::scheduler::dispatcher::BufferedDispatcher;

/// Where accepted notifications go.
#[derive(Clone)]
pub enum Ingestor {
    Broker(Arc<Producer>),
    Buffered(Arc<BufferedDispatcher>),
}

impl Ingestor {
    pub async fn submit(&self, notifications: Vec<Notification>) -> Result<(), ProducerError> {
        match self {
            Ingestor::Broker(producer) => producer.publish(&notifications).await,
            Ingestor::Buffered(dispatcher) => {
                for result in dispatcher.ingest(notifications).await {
                    if !result.is_success() {
                        tracing::warn!(
                            notification_id = %result.notification.id,
                            error = result.error.as_deref().unwrap_or_default(),
                            "immediate delivery failed"
                        );
                    }
                }
                Ok(())
            }
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Ingestor,
    pub health: HealthCheck,
    pub server_config: ServerConfig,
}
