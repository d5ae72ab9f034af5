use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::channels::adapter::{Channel, ChannelError, ChannelType};
use crate::config::BitrixChannelConfig;
use crate::notifications::types::Contact;

/// Bitrix24 chat delivery through an inbound REST webhook.
#[derive(Debug, Clone)]
pub struct BitrixChannel {
    client: Client,
    webhook: Url,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct BitrixReply {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl BitrixChannel {
    pub fn new(config: &BitrixChannelConfig) -> Result<Self, ChannelError> {
        let timeout = Duration::from_millis(config.timeout_ms());
        let raw = config.webhook_url.clone().unwrap_or_default();
        let normalized = if raw.ends_with('/') {
            raw
        } else {
            format!("{raw}/")
        };
        let webhook = Url::parse(&normalized)
            .map_err(|err| ChannelError::Transport(format!("invalid webhook url: {err}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| ChannelError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            webhook,
            timeout,
        })
    }

    fn method_url(&self, method: &str) -> Result<Url, ChannelError> {
        self.webhook
            .join(method)
            .map_err(|err| ChannelError::Transport(err.to_string()))
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<(), ChannelError> {
        let url = self.method_url(method)?;
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ChannelError::Timeout(self.timeout)
                } else {
                    ChannelError::Transport(err.to_string())
                }
            })?;
        let status = response.status();
        let reply = response
            .json::<BitrixReply>()
            .await
            .map_err(|err| ChannelError::Transport(format!("unreadable reply ({status}): {err}")))?;
        if let Some(error) = reply.error {
            let description = reply.error_description.unwrap_or_default();
            return Err(ChannelError::Rejected(format!("{error}: {description}")));
        }
        if !status.is_success() {
            return Err(ChannelError::Rejected(format!("http status {status}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Channel for BitrixChannel {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Bitrix
    }

    async fn send(&self, contact: &Contact, message: &str) -> Result<(), ChannelError> {
        let Contact::Bitrix(dialog_id) = contact else {
            return Err(ChannelError::Unsupported(contact.to_string()));
        };
        self.call(
            "im.message.add.json",
            json!({ "DIALOG_ID": dialog_id.get().to_string(), "MESSAGE": message }),
        )
        .await
    }

    async fn check_health(&self) -> Result<(), ChannelError> {
        self.call("server.time.json", json!({})).await
    }
}
