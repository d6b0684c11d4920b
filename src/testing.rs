//! In-process doubles for the model backend and the chat platform

use crate::api::{ApiError, FragmentStream, ModelStreamClient, StreamFragment};
use crate::chat::{ChatError, ChatId, DraftId, FinalSender, ProgressChannel};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Replays a fixed fragment script and records the prompts it was given
#[derive(Default)]
pub struct ScriptedModel {
    script: Vec<StreamFragment>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn arc(script: Vec<StreamFragment>) -> Arc<Self> {
        Arc::new(Self {
            script,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelStreamClient for ScriptedModel {
    async fn open_stream(&self, prompt: &str) -> Result<FragmentStream, ApiError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(Box::pin(tokio_stream::iter(self.script.clone())))
    }
}

/// Backend that refuses every request
pub struct FailingModel;

#[async_trait]
impl ModelStreamClient for FailingModel {
    async fn open_stream(&self, _prompt: &str) -> Result<FragmentStream, ApiError> {
        Err(ApiError::Provider("backend unreachable".to_string()))
    }
}

/// Backend whose stream never yields
pub struct StalledModel;

#[async_trait]
impl ModelStreamClient for StalledModel {
    async fn open_stream(&self, _prompt: &str) -> Result<FragmentStream, ApiError> {
        Ok(Box::pin(futures_util::stream::pending::<StreamFragment>()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum DraftMode {
    #[default]
    Accept,
    RejectAll,
    RejectAfterPlaceholder,
}

/// Chat platform that records every call
#[derive(Default)]
pub struct RecordingChat {
    draft_mode: DraftMode,
    reject_finals: bool,
    drafts: Mutex<Vec<String>>,
    notices: Mutex<Vec<String>>,
    finals: Mutex<Vec<String>>,
    final_attempts: Mutex<usize>,
}

impl RecordingChat {
    pub fn failing_drafts() -> Self {
        Self {
            draft_mode: DraftMode::RejectAll,
            ..Self::default()
        }
    }

    pub fn failing_after_placeholder() -> Self {
        Self {
            draft_mode: DraftMode::RejectAfterPlaceholder,
            ..Self::default()
        }
    }

    pub fn failing_finals() -> Self {
        Self {
            reject_finals: true,
            ..Self::default()
        }
    }

    pub fn drafts(&self) -> Vec<String> {
        self.drafts.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    /// Successfully delivered final messages
    pub fn finals(&self) -> Vec<String> {
        self.finals.lock().unwrap().clone()
    }

    pub fn final_attempts(&self) -> usize {
        *self.final_attempts.lock().unwrap()
    }

    fn rejected() -> ChatError {
        ChatError::Api {
            code: 400,
            description: "Bad Request: rejected by test double".to_string(),
        }
    }
}

#[async_trait]
impl ProgressChannel for RecordingChat {
    async fn upsert_draft(
        &self,
        _chat_id: ChatId,
        _draft_id: DraftId,
        text: &str,
    ) -> Result<(), ChatError> {
        let mut drafts = self.drafts.lock().unwrap();
        let reject = match self.draft_mode {
            DraftMode::Accept => false,
            DraftMode::RejectAll => true,
            DraftMode::RejectAfterPlaceholder => !drafts.is_empty(),
        };
        if reject {
            return Err(Self::rejected());
        }
        drafts.push(text.to_string());
        Ok(())
    }

    async fn notify(&self, _chat_id: ChatId, text: &str) -> Result<(), ChatError> {
        self.notices.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[async_trait]
impl FinalSender for RecordingChat {
    async fn send_final(&self, _chat_id: ChatId, text: &str) -> Result<(), ChatError> {
        *self.final_attempts.lock().unwrap() += 1;
        if self.reject_finals {
            return Err(Self::rejected());
        }
        self.finals.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
