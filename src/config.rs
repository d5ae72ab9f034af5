use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::broker::message::NackOptions;
use crate::channels::adapter::ChannelType;

pub const DEFAULT_CONFIG_PATH: &str = "courier.toml";
pub const CONFIG_PATH_ENV: &str = "COURIER_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub broker: Option<BrokerConfig>,
    #[serde(default)]
    pub ingestion: Option<IngestionConfig>,
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,
    #[serde(default)]
    pub channels: Option<ChannelsConfig>,
    #[serde(default)]
    pub server: Option<ServerConfig>,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct BrokerConfig {
    pub url: Option<String>,
    pub queue: Option<String>,
    pub short_delay_queue: Option<String>,
    pub long_delay_queue: Option<String>,
    pub dead_letter_queue: Option<String>,
    pub short_delay_ms: Option<u64>,
    pub long_delay_ms: Option<u64>,
    pub max_batch_size: Option<usize>,
    pub batch_flush_timeout_ms: Option<u64>,
    pub publish_timeout_ms: Option<u64>,
    pub healthcheck_timeout_ms: Option<u64>,
    #[serde(default)]
    pub nack: Option<NackOptions>,
}

impl BrokerConfig {
    pub fn url(&self) -> String {
        self.url.clone().unwrap_or_else(|| "memory://".to_string())
    }

    pub fn queue(&self) -> String {
        self.queue
            .clone()
            .unwrap_or_else(|| "notifications".to_string())
    }

    pub fn short_delay_queue(&self) -> String {
        self.short_delay_queue
            .clone()
            .unwrap_or_else(|| "notifications.retry.short".to_string())
    }

    pub fn long_delay_queue(&self) -> String {
        self.long_delay_queue
            .clone()
            .unwrap_or_else(|| "notifications.retry.long".to_string())
    }

    pub fn dead_letter_queue(&self) -> String {
        self.dead_letter_queue
            .clone()
            .unwrap_or_else(|| "notifications.dlq".to_string())
    }

    pub fn short_delay_ms(&self) -> u64 {
        self.short_delay_ms.unwrap_or(60_000)
    }

    pub fn long_delay_ms(&self) -> u64 {
        self.long_delay_ms.unwrap_or(600_000)
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size.unwrap_or(50)
    }

    pub fn batch_flush_timeout_ms(&self) -> u64 {
        self.batch_flush_timeout_ms.unwrap_or(1_000)
    }

    pub fn publish_timeout_ms(&self) -> u64 {
        self.publish_timeout_ms.unwrap_or(5_000)
    }

    pub fn healthcheck_timeout_ms(&self) -> u64 {
        self.healthcheck_timeout_ms.unwrap_or(3_000)
    }

    pub fn nack_options(&self) -> NackOptions {
        self.nack.unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestionMode {
    #[default]
    Broker,
    Buffered,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct IngestionConfig {
    #[serde(default)]
    pub mode: IngestionMode,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct SchedulerConfig {
    pub interval_ms: Option<u64>,
    pub shutdown_poll_ms: Option<u64>,
}

impl SchedulerConfig {
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms.unwrap_or(5_000)
    }

    pub fn shutdown_poll_ms(&self) -> u64 {
        self.shutdown_poll_ms.unwrap_or(50)
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ChannelsConfig {
    pub priority: Option<Vec<String>>,
    pub email: Option<EmailChannelConfig>,
    pub bitrix: Option<BitrixChannelConfig>,
}

impl ChannelsConfig {
    pub fn priority_names(&self) -> Vec<String> {
        self.priority.clone().unwrap_or_else(|| {
            vec![
                ChannelType::Bitrix.as_str().to_string(),
                ChannelType::Email.as_str().to_string(),
            ]
        })
    }

    /// Channels in priority order that have a config section. Unknown
    /// names are skipped here; `Config::validate` rejects them.
    pub fn enabled(&self) -> Vec<ChannelType> {
        self.priority_names()
            .iter()
            .filter_map(|name| ChannelType::parse(name))
            .filter(|channel| self.is_configured(*channel))
            .collect()
    }

    pub fn is_configured(&self, channel: ChannelType) -> bool {
        match channel {
            ChannelType::Email => self.email.is_some(),
            ChannelType::Bitrix => self.bitrix.is_some(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct EmailChannelConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub from: Option<String>,
    pub helo: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl EmailChannelConfig {
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or("localhost")
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(25)
    }

    pub fn from(&self) -> String {
        self.from
            .clone()
            .unwrap_or_else(|| "courier@localhost".to_string())
    }

    pub fn helo(&self) -> String {
        self.helo.clone().unwrap_or_else(|| "localhost".to_string())
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(10_000)
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct BitrixChannelConfig {
    pub webhook_url: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl BitrixChannelConfig {
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(10_000)
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ServerConfig {
    pub bind: Option<String>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub cors: Option<CorsConfig>,
    pub body_limit_bytes: Option<usize>,
}

impl ServerConfig {
    pub fn bind(&self) -> String {
        self.bind
            .clone()
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
    }

    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_bytes.unwrap_or(1024 * 1024)
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        raw.parse()
    }

    /// `argv[1]`, then `COURIER_CONFIG`, then `courier.toml`.
    pub fn resolve_path(arg: Option<String>) -> String {
        arg.or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    pub fn broker(&self) -> BrokerConfig {
        self.broker.clone().unwrap_or_default()
    }

    pub fn ingestion_mode(&self) -> IngestionMode {
        self.ingestion
            .as_ref()
            .map(|ingestion| ingestion.mode)
            .unwrap_or_default()
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        self.scheduler.clone().unwrap_or_default()
    }

    pub fn channels(&self) -> ChannelsConfig {
        self.channels.clone().unwrap_or_default()
    }

    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    pub fn log_level(&self) -> String {
        self.logging
            .as_ref()
            .and_then(|logging| logging.level.clone())
            .unwrap_or_else(|| "info".to_string())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let broker = self.broker();
        let url = broker.url();
        if !url.starts_with("memory://") {
            return Err(invalid(format!("unsupported broker url: {url}")));
        }
        if broker.max_batch_size() == 0 {
            return Err(invalid("broker.max_batch_size must be positive"));
        }
        for (name, value) in [
            ("broker.batch_flush_timeout_ms", broker.batch_flush_timeout_ms()),
            ("broker.publish_timeout_ms", broker.publish_timeout_ms()),
            ("broker.healthcheck_timeout_ms", broker.healthcheck_timeout_ms()),
            ("broker.short_delay_ms", broker.short_delay_ms()),
            ("broker.long_delay_ms", broker.long_delay_ms()),
            ("scheduler.interval_ms", self.scheduler().interval_ms()),
            ("scheduler.shutdown_poll_ms", self.scheduler().shutdown_poll_ms()),
        ] {
            if value == 0 {
                return Err(invalid(format!("{name} must be positive")));
            }
        }

        let queues = [
            broker.queue(),
            broker.short_delay_queue(),
            broker.long_delay_queue(),
            broker.dead_letter_queue(),
        ];
        let mut seen = HashSet::new();
        for queue in &queues {
            if queue.trim().is_empty() {
                return Err(invalid("queue names must not be empty"));
            }
            if !seen.insert(queue.as_str()) {
                return Err(invalid(format!("queue {queue} is configured twice")));
            }
        }

        let channels = self.channels();
        let mut listed = HashSet::new();
        for name in channels.priority_names() {
            let Some(channel) = ChannelType::parse(&name) else {
                return Err(invalid(format!("unknown channel in priority: {name}")));
            };
            if !listed.insert(channel) {
                return Err(invalid(format!("channel {name} is listed twice in priority")));
            }
            if channels.priority.is_some() && !channels.is_configured(channel) {
                return Err(invalid(format!(
                    "channel {name} is prioritised but [channels.{name}] is missing"
                )));
            }
        }
        if let Some(bitrix) = &channels.bitrix
            && bitrix.webhook_url.as_deref().unwrap_or_default().is_empty()
        {
            return Err(invalid("channels.bitrix.webhook_url is required"));
        }
        if let Some(email) = &channels.email
            && email.host.as_deref().unwrap_or_default().is_empty()
        {
            return Err(invalid("channels.email.host is required"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}
