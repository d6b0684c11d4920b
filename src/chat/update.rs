//! Inbound Telegram updates as delivered to the webhook

use super::{ChatError, ChatId};
use crate::orchestrator::Request;
use serde::Deserialize;

/// The subset of a Telegram `Update` the relay reads
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// What the relay should do with one update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Plain text to answer with the model
    Prompt(Request),
    /// A `/command`, with any `@botname` suffix removed
    Command { chat_id: ChatId, name: String },
    /// Nothing to answer (edits, stickers, blank text, ...)
    Ignored,
}

/// Parse a raw webhook body into an inbound event
pub fn parse_update(body: &[u8]) -> Result<InboundEvent, ChatError> {
    let update: Update = serde_json::from_slice(body)?;
    Ok(update.into_event())
}

impl Update {
    pub fn into_event(self) -> InboundEvent {
        let Some(message) = self.message else {
            return InboundEvent::Ignored;
        };
        let chat_id = ChatId(message.chat.id);
        let Some(text) = message.text else {
            return InboundEvent::Ignored;
        };

        if let Some(command) = text.trim_start().strip_prefix('/') {
            let name = command
                .split_whitespace()
                .next()
                .and_then(|word| word.split('@').next())
                .unwrap_or_default()
                .to_lowercase();
            if !name.is_empty() {
                return InboundEvent::Command { chat_id, name };
            }
        }

        match Request::new(chat_id, text) {
            Some(request) => InboundEvent::Prompt(request),
            None => InboundEvent::Ignored,
        }
    }
}
