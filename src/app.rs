use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;

use crate::broker::message::QueueOptions;
use crate::broker::{Broker, InMemoryBroker};
use crate::channels::adapter::{Channel, ChannelType};
use crate::channels::bitrix::BitrixChannel;
use crate::channels::email::EmailChannel;
use crate::channels::logged::LoggedChannel;
use crate::config::{ChannelsConfig, Config, IngestionMode};
use crate::delivery::service::DeliveryService;
use crate::health::{HealthCheck, HealthProbe};
use crate::queue::consumer::{BatchConsumer, ConsumerSettings};
use crate::queue::handler::BatchHandler;
use crate::queue::producer::Producer;
use crate::queue::retry::RetryConsumer;
use crate::queue::router::RetryRouter;
use crate::scheduler::dispatcher::BufferedDispatcher;
use crate::scheduler::service::Scheduler;
use crate::server::{AppState, Ingestor, build_router};

enum Pipeline {
    Broker {
        producer: Arc<Producer>,
        consumer: Arc<BatchConsumer>,
        retries: Vec<Arc<RetryConsumer>>,
    },
    Buffered {
        dispatcher: Arc<BufferedDispatcher>,
        scheduler: Scheduler,
    },
}

/// The assembled service. Everything is constructed up front by
/// [`build`]; nothing runs until [`App::start`].
pub struct App {
    config: Config,
    broker: Arc<InMemoryBroker>,
    pipeline: Pipeline,
    state: AppState,
}

/// Builds channels from the config, then the rest of the graph.
pub fn build(config: Config) -> anyhow::Result<App> {
    let channels = build_channels(&config.channels())?;
    assemble(config, channels)
}

/// Builds the graph around an explicit channel list in priority order.
pub fn assemble(config: Config, channels: Vec<Arc<dyn Channel>>) -> anyhow::Result<App> {
    let broker_config = config.broker();
    let health_timeout = Duration::from_millis(broker_config.healthcheck_timeout_ms());
    let delivery = Arc::new(DeliveryService::new(channels, health_timeout));
    let broker = Arc::new(InMemoryBroker::new());
    let shared_broker: Arc<dyn Broker> = broker.clone();

    let mut probes: Vec<Arc<dyn HealthProbe>> = vec![delivery.clone()];
    let (pipeline, ingestor) = match config.ingestion_mode() {
        IngestionMode::Broker => {
            let producer = Arc::new(Producer::new(
                shared_broker.clone(),
                broker_config.queue(),
                Duration::from_millis(broker_config.publish_timeout_ms()),
                health_timeout,
            ));
            let router = RetryRouter::new(
                broker_config.short_delay_queue(),
                broker_config.long_delay_queue(),
                broker_config.dead_letter_queue(),
            );
            let handler: Arc<dyn BatchHandler> = delivery.clone();
            let consumer = Arc::new(BatchConsumer::new(
                shared_broker.clone(),
                producer.clone(),
                router.clone(),
                handler.clone(),
                ConsumerSettings::from_config(&broker_config, broker_config.queue()),
            ));
            let mut retries = Vec::new();
            for queue in [router.short_delay(), router.long_delay()] {
                retries.push(Arc::new(RetryConsumer::new(
                    shared_broker.clone(),
                    producer.clone(),
                    router.clone(),
                    handler.clone(),
                    ConsumerSettings::from_config(&broker_config, queue),
                )?));
            }
            probes.push(producer.clone());
            probes.push(consumer.clone());
            for retry in &retries {
                probes.push(retry.clone());
            }
            (
                Pipeline::Broker {
                    producer: producer.clone(),
                    consumer,
                    retries,
                },
                Ingestor::Broker(producer),
            )
        }
        IngestionMode::Buffered => {
            let scheduler_config = config.scheduler();
            let dispatcher = Arc::new(BufferedDispatcher::new(delivery.clone()));
            let task_dispatcher = dispatcher.clone();
            let scheduler = Scheduler::new(
                Duration::from_millis(scheduler_config.interval_ms()),
                move || {
                    let dispatcher = task_dispatcher.clone();
                    async move { dispatcher.flush_task().await }
                },
            )
            .with_poll_interval(Duration::from_millis(scheduler_config.shutdown_poll_ms()));
            (
                Pipeline::Buffered {
                    dispatcher: dispatcher.clone(),
                    scheduler,
                },
                Ingestor::Buffered(dispatcher),
            )
        }
    };

    let state = AppState {
        ingestor,
        health: HealthCheck::new(probes, health_timeout),
        server_config: config.server(),
    };
    Ok(App {
        config,
        broker,
        pipeline,
        state,
    })
}

fn build_channels(config: &ChannelsConfig) -> anyhow::Result<Vec<Arc<dyn Channel>>> {
    let mut channels = Vec::new();
    for channel_type in config.enabled() {
        let channel: Arc<dyn Channel> = match channel_type {
            ChannelType::Email => {
                let Some(email) = config.email.as_ref() else {
                    continue;
                };
                Arc::new(EmailChannel::new(email))
            }
            ChannelType::Bitrix => {
                let Some(bitrix) = config.bitrix.as_ref() else {
                    continue;
                };
                Arc::new(BitrixChannel::new(bitrix).context("failed to build bitrix channel")?)
            }
        };
        tracing::info!(channel = %channel_type, "channel enabled");
        channels.push(LoggedChannel::wrap(channel));
    }
    if channels.is_empty() {
        tracing::warn!("no delivery channels configured; every notification will fail");
    }
    Ok(channels)
}

impl App {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn broker(&self) -> Arc<InMemoryBroker> {
        self.broker.clone()
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Declares the queue topology, then starts the producer, consumers
    /// and scheduler.
    pub async fn start(&self) -> anyhow::Result<()> {
        match &self.pipeline {
            Pipeline::Broker {
                producer,
                consumer,
                retries,
            } => {
                self.declare_topology().await?;
                producer.start().await.context("failed to start producer")?;
                consumer.start().await.context("failed to start consumer")?;
                for retry in retries {
                    retry
                        .start()
                        .await
                        .with_context(|| format!("failed to start consumer for {}", retry.queue()))?;
                }
            }
            Pipeline::Buffered { scheduler, .. } => {
                scheduler.start().await.context("failed to start scheduler")?;
            }
        }
        tracing::info!(mode = ?self.config.ingestion_mode(), "courier started");
        Ok(())
    }

    /// Stops consumers (flushing partial batches), then the scheduler with
    /// a final buffer flush, then the producer, then the broker.
    pub async fn shutdown(&self) {
        match &self.pipeline {
            Pipeline::Broker {
                producer,
                consumer,
                retries,
            } => {
                consumer.shutdown().await;
                for retry in retries {
                    retry.shutdown().await;
                }
                producer.shutdown().await;
            }
            Pipeline::Buffered {
                dispatcher,
                scheduler,
            } => {
                scheduler.shutdown().await;
                let results = dispatcher.flush().await;
                if !results.is_empty() {
                    let failed = results.iter().filter(|result| !result.is_success()).count();
                    tracing::info!(flushed = results.len(), failed, "final buffer flush");
                }
            }
        }
        self.broker.close().await;
        tracing::info!("courier stopped");
    }

    async fn declare_topology(&self) -> anyhow::Result<()> {
        let broker = self.config.broker();
        let queues = [
            (broker.queue(), None),
            (
                broker.short_delay_queue(),
                Some(Duration::from_millis(broker.short_delay_ms())),
            ),
            (
                broker.long_delay_queue(),
                Some(Duration::from_millis(broker.long_delay_ms())),
            ),
            (broker.dead_letter_queue(), None),
        ];
        for (queue, delay) in queues {
            self.broker
                .declare_queue(&queue, QueueOptions { delay })
                .await
                .with_context(|| format!("failed to declare queue {queue}"))?;
            tracing::debug!(queue = %queue, delay_ms = delay.map(|d| d.as_millis() as u64), "queue declared");
        }
        Ok(())
    }
}
