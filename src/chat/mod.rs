//! Chat surface abstraction: progress drafts and final messages
//!
//! The orchestrator talks to the chat platform through two narrow traits so that
//! the Telegram client, the console sink and test doubles are interchangeable.

mod chunk;
mod console;
mod draft;
mod telegram;
mod update;

pub use chunk::split_message;
pub use console::ConsoleChannel;
pub use draft::{DraftId, DRAFT_ID_RANGE};
pub use telegram::{TelegramClient, TelegramConfig, TelegramUser, TELEGRAM_MAX_MESSAGE_LEN};
pub use update::{parse_update, InboundEvent, Update};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Chat API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Empty message text")]
    EmptyText,

    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque identifier of the destination chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Best-effort progress display for an in-flight answer
#[async_trait]
pub trait ProgressChannel: Send + Sync {
    /// Create or overwrite the draft identified by `draft_id`
    async fn upsert_draft(&self, chat_id: ChatId, draft_id: DraftId, text: &str)
        -> Result<(), ChatError>;

    /// Plain notice shown when no draft could be created
    async fn notify(&self, chat_id: ChatId, text: &str) -> Result<(), ChatError>;
}

/// Delivery of the single terminal message of a request
#[async_trait]
pub trait FinalSender: Send + Sync {
    async fn send_final(&self, chat_id: ChatId, text: &str) -> Result<(), ChatError>;
}
