//! Streaming response orchestration
//!
//! One [`Orchestrator::run`] call handles one inbound chat message:
//! - creates a placeholder draft (falling back to a plain notice)
//! - streams the model answer, refreshing the draft every few dozen characters
//! - sends exactly one final message: the answer, an apology, or the error

mod outcome;
mod throttle;

pub use outcome::{CompletionOutcome, RunReport};
pub use throttle::ProgressThrottle;

use crate::api::{ModelStreamClient, StreamFragment};
use crate::chat::{ChatId, DraftId, FinalSender, ProgressChannel};
use crate::config::OrchestratorSettings;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// One inbound chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub chat_id: ChatId,
    pub text: String,
}

impl Request {
    /// Returns None when the text is blank
    pub fn new(chat_id: ChatId, text: impl AsRef<str>) -> Option<Self> {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            chat_id,
            text: text.to_string(),
        })
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Draft refresh interval in characters (0 disables refreshes)
    pub throttle_chars: usize,
    /// Text of the draft created before the model answers
    pub draft_placeholder: String,
    /// Sent when the draft could not be created
    pub processing_notice: String,
    /// Sent when the model finishes without any text
    pub empty_reply: String,
    /// Prepended to the failure cause
    pub error_prefix: String,
    /// Upper bound on the whole model call
    pub stream_timeout: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&OrchestratorSettings::default())
    }
}

impl From<&OrchestratorSettings> for OrchestratorConfig {
    fn from(settings: &OrchestratorSettings) -> Self {
        Self {
            throttle_chars: settings.throttle_chars,
            draft_placeholder: settings.draft_placeholder.clone(),
            processing_notice: settings.processing_notice.clone(),
            empty_reply: settings.empty_reply.clone(),
            error_prefix: settings.error_prefix.clone(),
            stream_timeout: match settings.stream_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

/// Lifecycle of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Init,
    DraftPending,
    Streaming,
    Finalizing,
    Done,
}

/// Append-only answer text with its character count
#[derive(Debug, Default)]
struct Accumulator {
    text: String,
    chars: usize,
}

impl Accumulator {
    fn push(&mut self, delta: &str) {
        self.text.push_str(delta);
        self.chars += delta.chars().count();
    }

    fn has_visible_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Per-request state, released on every exit path
struct RequestContext {
    draft_id: DraftId,
    state: OrchestratorState,
    accumulator: Accumulator,
    draft_updates: usize,
    draft_update_failures: usize,
}

impl RequestContext {
    fn new(draft_id: DraftId) -> Self {
        Self {
            draft_id,
            state: OrchestratorState::Init,
            accumulator: Accumulator::default(),
            draft_updates: 0,
            draft_update_failures: 0,
        }
    }

    fn advance(&mut self, next: OrchestratorState) {
        debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        // Reached only when the surrounding task is cancelled mid-request
        if self.state != OrchestratorState::Done {
            warn!(
                draft_id = %self.draft_id,
                state = ?self.state,
                "request abandoned before a final message was sent"
            );
        }
    }
}

/// Drives one model stream into one chat
pub struct Orchestrator {
    config: OrchestratorConfig,
    model: Arc<dyn ModelStreamClient>,
    progress: Arc<dyn ProgressChannel>,
    sender: Arc<dyn FinalSender>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        model: Arc<dyn ModelStreamClient>,
        progress: Arc<dyn ProgressChannel>,
        sender: Arc<dyn FinalSender>,
    ) -> Self {
        Self {
            config,
            model,
            progress,
            sender,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Handle one request end to end with a freshly generated draft id
    pub async fn run(&self, request: Request) -> RunReport {
        self.run_with_draft(request, DraftId::generate()).await
    }

    pub async fn run_with_draft(&self, request: Request, draft_id: DraftId) -> RunReport {
        let span = info_span!("relay", chat_id = %request.chat_id, %draft_id);
        self.drive(request, draft_id).instrument(span).await
    }

    async fn drive(&self, request: Request, draft_id: DraftId) -> RunReport {
        let mut ctx = RequestContext::new(draft_id);

        ctx.advance(OrchestratorState::DraftPending);
        let draft_created = self.open_draft(&request, draft_id).await;

        ctx.advance(OrchestratorState::Streaming);
        let stream_outcome = match self.config.stream_timeout {
            Some(limit) => tokio::time::timeout(
                limit,
                self.consume_stream(&request, &mut ctx, draft_created),
            )
            .await
            .unwrap_or_else(|_| {
                CompletionOutcome::Failure(format!("model stream timed out after {:?}", limit))
            }),
            None => self.consume_stream(&request, &mut ctx, draft_created).await,
        };

        ctx.advance(OrchestratorState::Finalizing);
        let final_text = self.final_text(&stream_outcome);
        let delivery = self.sender.send_final(request.chat_id, &final_text).await;
        let (outcome, final_delivered) = match delivery {
            Ok(()) => (stream_outcome, true),
            Err(e) => {
                error!("final send failed: {}", e);
                let cause = format!("final send failed: {}", e);
                (CompletionOutcome::Failure(cause), false)
            }
        };

        ctx.advance(OrchestratorState::Done);
        info!(
            outcome = outcome.label(),
            draft_updates = ctx.draft_updates,
            draft_update_failures = ctx.draft_update_failures,
            "request finished: {}",
            outcome
        );

        RunReport {
            outcome,
            draft_id,
            draft_created,
            draft_updates: ctx.draft_updates,
            draft_update_failures: ctx.draft_update_failures,
            final_text,
            final_delivered,
        }
    }

    /// Returns whether progress drafts can be used for this request
    async fn open_draft(&self, request: &Request, draft_id: DraftId) -> bool {
        match self
            .progress
            .upsert_draft(request.chat_id, draft_id, &self.config.draft_placeholder)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("draft unavailable, falling back to a notice: {}", e);
                if let Err(e) = self
                    .progress
                    .notify(request.chat_id, &self.config.processing_notice)
                    .await
                {
                    warn!("processing notice failed: {}", e);
                }
                false
            }
        }
    }

    async fn consume_stream(
        &self,
        request: &Request,
        ctx: &mut RequestContext,
        drafts_enabled: bool,
    ) -> CompletionOutcome {
        let mut stream = match self.model.open_stream(&request.text).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("model stream failed to open: {}", e);
                return CompletionOutcome::Failure(e.to_string());
            }
        };

        let mut throttle = ProgressThrottle::new(self.config.throttle_chars);

        while let Some(fragment) = stream.next().await {
            match fragment {
                StreamFragment::TextDelta(delta) => {
                    ctx.accumulator.push(&delta);
                    debug!(total_chars = ctx.accumulator.chars, "fragment received");

                    if throttle.observe(ctx.accumulator.chars) && drafts_enabled {
                        ctx.draft_updates += 1;
                        if let Err(e) = self
                            .progress
                            .upsert_draft(request.chat_id, ctx.draft_id, &ctx.accumulator.text)
                            .await
                        {
                            ctx.draft_update_failures += 1;
                            warn!("draft update failed: {}", e);
                        }
                    }
                }
                StreamFragment::Stop => {
                    return if ctx.accumulator.has_visible_text() {
                        CompletionOutcome::Success(std::mem::take(&mut ctx.accumulator.text))
                    } else {
                        CompletionOutcome::EmptyResult
                    };
                }
                StreamFragment::Error(cause) => {
                    warn!(discarded_chars = ctx.accumulator.chars, "model stream error: {}", cause);
                    return CompletionOutcome::Failure(cause);
                }
            }
        }

        CompletionOutcome::Failure("model stream closed without an end marker".to_string())
    }

    fn final_text(&self, outcome: &CompletionOutcome) -> String {
        match outcome {
            CompletionOutcome::Success(text) => text.clone(),
            CompletionOutcome::EmptyResult => self.config.empty_reply.clone(),
            CompletionOutcome::Failure(cause) => format!("{} {}", self.config.error_prefix, cause),
        }
    }
}
