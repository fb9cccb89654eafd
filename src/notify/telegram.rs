//! Telegram Bot API channel

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{Notifier, NotifyError};
use crate::config::TelegramConfig;
use crate::types::BatchId;

pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
struct BotResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(
        api_base: impl Into<String>,
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        })
    }

    /// Build from config; `NotConfigured` unless both token and chat id are set.
    pub fn from_config(config: &TelegramConfig, timeout: Duration) -> Result<Self, NotifyError> {
        match (&config.bot_token, &config.chat_id) {
            (Some(token), Some(chat)) if config.is_configured() => {
                Self::new(config.api_base.clone(), token.clone(), chat.clone(), timeout)
            }
            _ => Err(NotifyError::NotConfigured),
        }
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    /// Chat that receives alerts.
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Plain-text answer to a bot command, sent to the chat it came from.
    pub async fn reply(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        self.send_message(json!({
            "chat_id": chat_id,
            "text": text,
        }))
        .await
    }

    async fn send_message(&self, payload: serde_json::Value) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.send_message_url())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // The Bot API reports failures both via status and the `ok` flag
        let parsed: Option<BotResponse> = serde_json::from_str(&body).ok();
        match parsed {
            Some(reply) if status.is_success() && reply.ok => Ok(()),
            Some(reply) => Err(NotifyError::Api {
                status: status.as_u16(),
                body: reply.description.unwrap_or(body),
            }),
            None => Err(NotifyError::Api {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, batch_id: BatchId, message: &str) -> Result<(), NotifyError> {
        self.send_message(json!({
            "chat_id": self.chat_id,
            "text": message,
            "parse_mode": "HTML",
        }))
        .await?;
        debug!(batch_id = %batch_id, "Telegram message delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "telegram"
    }
}
