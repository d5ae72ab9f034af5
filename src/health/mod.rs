use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::delivery::service::DeliveryService;
use crate::queue::consumer::BatchConsumer;
use crate::queue::producer::Producer;
use crate::queue::retry::RetryConsumer;

/// A component that can report whether it is able to do its job.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn component(&self) -> String;

    async fn check_health(&self) -> Result<(), String>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ComponentHealth {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub ready: bool,
    pub components: Vec<ComponentHealth>,
}

/// Readiness over a fixed set of probes. Every probe runs on each check,
/// concurrently and bounded by `timeout`; one failure does not hide the
/// others.
#[derive(Clone)]
pub struct HealthCheck {
    probes: Vec<Arc<dyn HealthProbe>>,
    timeout: Duration,
}

impl HealthCheck {
    pub fn new(probes: Vec<Arc<dyn HealthProbe>>, timeout: Duration) -> Self {
        Self { probes, timeout }
    }

    pub async fn readiness(&self) -> HealthReport {
        let checks = self.probes.iter().map(|probe| async move {
            let name = probe.component();
            let outcome = match tokio::time::timeout(self.timeout, probe.check_health()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(format!("health check timed out after {:?}", self.timeout)),
            };
            match outcome {
                Ok(()) => ComponentHealth {
                    name,
                    healthy: true,
                    error: None,
                },
                Err(error) => {
                    tracing::warn!(component = %name, error = %error, "component unhealthy");
                    ComponentHealth {
                        name,
                        healthy: false,
                        error: Some(error),
                    }
                }
            }
        });
        let components = futures::future::join_all(checks).await;
        HealthReport {
            ready: components.iter().all(|component| component.healthy),
            components,
        }
    }
}

#[async_trait]
impl HealthProbe for DeliveryService {
    fn component(&self) -> String {
        "delivery".to_string()
    }

    async fn check_health(&self) -> Result<(), String> {
        DeliveryService::check_health(self)
            .await
            .map_err(|err| err.to_string())
    }
}

#[async_trait]
impl HealthProbe for Producer {
    fn component(&self) -> String {
        format!("producer:{}", self.queue())
    }

    async fn check_health(&self) -> Result<(), String> {
        Producer::check_health(self)
            .await
            .map_err(|err| err.to_string())
    }
}

#[async_trait]
impl HealthProbe for BatchConsumer {
    fn component(&self) -> String {
        format!("consumer:{}", self.queue())
    }

    async fn check_health(&self) -> Result<(), String> {
        BatchConsumer::check_health(self)
            .await
            .map_err(|err| err.to_string())
    }
}

#[async_trait]
impl HealthProbe for RetryConsumer {
    fn component(&self) -> String {
        format!("retry-consumer:{}", self.queue())
    }

    async fn check_health(&self) -> Result<(), String> {
        RetryConsumer::check_health(self)
            .await
            .map_err(|err| err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{HealthCheck, HealthProbe};

    struct Probe {
        name: &'static str,
        result: Result<(), &'static str>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl Probe {
        fn new(name: &'static str, result: Result<(), &'static str>) -> Arc<Self> {
            Arc::new(Self {
                name,
                result,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl HealthProbe for Probe {
        fn component(&self) -> String {
            self.name.to_string()
        }

        async fn check_health(&self) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.result.map_err(str::to_string)
        }
    }

    #[tokio::test]
    async fn reports_every_component_without_fail_fast() {
        let broken = Probe::new("broker", Err("connection refused"));
        let fine = Probe::new("delivery", Ok(()));
        let probes: Vec<Arc<dyn HealthProbe>> = vec![broken.clone(), fine.clone()];
        let check = HealthCheck::new(probes, Duration::from_secs(1));

        let report = check.readiness().await;
        assert!(!report.ready);
        assert_eq!(report.components.len(), 2);
        assert_eq!(report.components[0].error.as_deref(), Some("connection refused"));
        assert!(report.components[1].healthy);
        assert_eq!(fine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_times_out() {
        let slow = Arc::new(Probe {
            name: "smtp",
            result: Ok(()),
            delay: Duration::from_secs(30),
            calls: AtomicUsize::new(0),
        });
        let probes: Vec<Arc<dyn HealthProbe>> = vec![slow];
        let check = HealthCheck::new(probes, Duration::from_millis(100));
        let report = check.readiness().await;
        assert!(!report.ready);
        assert!(report.components[0]
            .error
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }
}
