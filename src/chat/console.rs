//! Terminal stand-in for the chat platform, used by `chat-relay ask --console`

use super::{ChatError, ChatId, DraftId, FinalSender, ProgressChannel};
use async_trait::async_trait;
use std::io::Write;

/// Drafts go to stderr, the final answer to stdout
#[derive(Debug, Default, Clone)]
pub struct ConsoleChannel;

impl ConsoleChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProgressChannel for ConsoleChannel {
    async fn upsert_draft(
        &self,
        _chat_id: ChatId,
        draft_id: DraftId,
        text: &str,
    ) -> Result<(), ChatError> {
        let mut err = std::io::stderr().lock();
        writeln!(err, "[draft {} | {} chars]", draft_id, text.chars().count())?;
        Ok(())
    }

    async fn notify(&self, _chat_id: ChatId, text: &str) -> Result<(), ChatError> {
        let mut err = std::io::stderr().lock();
        writeln!(err, "[notice] {}", text)?;
        Ok(())
    }
}

#[async_trait]
impl FinalSender for ConsoleChannel {
    async fn send_final(&self, _chat_id: ChatId, text: &str) -> Result<(), ChatError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", text)?;
        out.flush()?;
        Ok(())
    }
}
