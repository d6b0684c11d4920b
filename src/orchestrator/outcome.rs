//! Terminal values of one orchestrated request

use crate::chat::DraftId;
use serde::Serialize;
use std::fmt;

/// Terminal classification of one request's processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// The model produced an answer and it was delivered
    Success(String),
    /// The model finished without producing any text
    EmptyResult,
    /// The stream or the final send failed
    Failure(String),
}

impl CompletionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CompletionOutcome::Failure(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            CompletionOutcome::Success(_) => "success",
            CompletionOutcome::EmptyResult => "empty_result",
            CompletionOutcome::Failure(_) => "failure",
        }
    }
}

impl fmt::Display for CompletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionOutcome::Success(text) => write!(f, "success ({} chars)", text.chars().count()),
            CompletionOutcome::EmptyResult => write!(f, "empty result"),
            CompletionOutcome::Failure(cause) => write!(f, "failure: {}", cause),
        }
    }
}

/// Side effects performed while handling one request
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: CompletionOutcome,
    pub draft_id: DraftId,
    /// Whether the placeholder draft was accepted by the chat platform
    pub draft_created: bool,
    /// Progress updates attempted after the placeholder
    pub draft_updates: usize,
    pub draft_update_failures: usize,
    /// Text handed to the final sender
    pub final_text: String,
    pub final_delivered: bool,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        !self.outcome.is_failure()
    }
}
