//! Telegram Bot API client
//!
//! Implements draft streaming (`sendMessageDraft`), plain messages (`sendMessage`)
//! and the webhook registration used at deploy time.

use super::chunk::{split_message, truncate_units};
use super::{ChatError, ChatId, DraftId, FinalSender, ProgressChannel};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Telegram hard limit for text messages, in UTF-16 code units
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Default timeout for Telegram API calls
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Telegram client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    pub bot_token: String,
    /// Bot API server (override for a local Bot API server)
    pub api_base: String,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

pub struct TelegramClient {
    config: TelegramConfig,
    client: Client,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    pub fn with_client(config: TelegramConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    /// Call a Bot API method and unwrap its `{ ok, result }` envelope
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChatError> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(&params)
            .timeout(API_TIMEOUT)
            .send()
            .await?;

        // Error responses still carry the JSON envelope, so the status is not checked first
        let status = response.status();
        let body = response.text().await?;
        let envelope: TelegramResponse<T> = serde_json::from_str(&body).map_err(|_| ChatError::Api {
            code: i64::from(status.as_u16()),
            description: format!("unexpected response to {}", method),
        })?;

        envelope.into_result(method)
    }

    /// Show or replace the in-progress draft for a chat
    pub async fn send_message_draft(
        &self,
        chat_id: ChatId,
        draft_id: DraftId,
        text: &str,
    ) -> Result<(), ChatError> {
        let text = truncate_units(text, TELEGRAM_MAX_MESSAGE_LEN);
        let _: bool = self
            .call(
                "sendMessageDraft",
                json!({
                    "chat_id": chat_id.0,
                    "draft_id": draft_id.get(),
                    "text": text,
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<i64, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyText);
        }

        let message: TelegramMessageResponse = self
            .call("sendMessage", json!({ "chat_id": chat_id.0, "text": text }))
            .await?;
        Ok(message.message_id)
    }

    /// Register the webhook URL that Telegram delivers updates to
    pub async fn set_webhook(&self, url: &str) -> Result<(), ChatError> {
        let _: bool = self
            .call(
                "setWebhook",
                json!({ "url": url, "allowed_updates": ["message"] }),
            )
            .await?;
        Ok(())
    }

    /// Verify the token by fetching the bot's own account
    pub async fn get_me(&self) -> Result<TelegramUser, ChatError> {
        self.call("getMe", json!({})).await
    }
}

#[async_trait]
impl ProgressChannel for TelegramClient {
    async fn upsert_draft(
        &self,
        chat_id: ChatId,
        draft_id: DraftId,
        text: &str,
    ) -> Result<(), ChatError> {
        self.send_message_draft(chat_id, draft_id, text).await
    }

    async fn notify(&self, chat_id: ChatId, text: &str) -> Result<(), ChatError> {
        self.send_message(chat_id, text).await.map(|_| ())
    }
}

#[async_trait]
impl FinalSender for TelegramClient {
    /// Long answers go out as consecutive messages; the first failure stops the rest
    async fn send_final(&self, chat_id: ChatId, text: &str) -> Result<(), ChatError> {
        let parts = split_message(text, TELEGRAM_MAX_MESSAGE_LEN);
        if parts.is_empty() {
            return Err(ChatError::EmptyText);
        }

        let total = parts.len();
        for (idx, part) in parts.iter().enumerate() {
            let message_id = self.send_message(chat_id, part).await?;
            debug!(%chat_id, message_id, part = idx + 1, total, "final message part sent");
        }
        Ok(())
    }
}

// ============================================================================
// Telegram API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

impl<T> TelegramResponse<T> {
    fn into_result(self, method: &str) -> Result<T, ChatError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(ChatError::Api {
                code: 0,
                description: format!("{} returned ok without a result", method),
            }),
            (false, _) => Err(ChatError::Api {
                code: self.error_code.unwrap_or_default(),
                description: self.description.unwrap_or_default(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TelegramMessageResponse {
    message_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: Option<String>,
    pub username: Option<String>,
}
