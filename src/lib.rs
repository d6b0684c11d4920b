//! chat-relay - Stream model answers into chat drafts
//!
//! A Telegram webhook hands each text message to a streaming model backend.
//! While the answer is generated, a draft message shows its progress; once
//! the stream ends the chat receives exactly one final message.
//!
//! ## Key Features
//!
//! - **Streaming Orchestration**: per-request state machine with throttled draft updates
//! - **Model Backends**: Gemini, OpenAI-compatible, Anthropic and Ollama streaming APIs
//! - **Telegram Surface**: `sendMessageDraft` progress, split final messages, webhook setup
//! - **Webhook Server**: axum routes mapping outcomes to `Success`/`Failure` responses

pub mod api;
pub mod chat;
pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod webhook;

#[cfg(test)]
mod testing;

pub use api::{ApiAgent, ApiConfig, ApiError, ModelStreamClient, ProviderType, StreamFragment};
pub use chat::{ChatError, ChatId, DraftId, FinalSender, ProgressChannel, TelegramClient};
pub use config::{Config, ConfigBuilder, ConfigError};
pub use metrics::{MetricsTracker, RelayMetrics};
pub use orchestrator::{CompletionOutcome, Orchestrator, OrchestratorConfig, Request, RunReport};
pub use webhook::{Relay, RelayError, WebhookResponse};
