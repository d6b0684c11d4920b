//! Streaming response support for model backends

use super::ApiError;
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

/// One incremental unit of model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFragment {
    /// A text delta (partial content)
    TextDelta(String),
    /// The backend signalled the end of the answer
    Stop,
    /// An error occurred during streaming
    Error(String),
}

impl StreamFragment {
    /// Whether this fragment ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamFragment::Stop | StreamFragment::Error(_))
    }
}

/// Ordered fragments of one completion call
pub type FragmentStream = Pin<Box<dyn Stream<Item = StreamFragment> + Send>>;

/// Trait for backends that stream completions
#[async_trait]
pub trait ModelStreamClient: Send + Sync {
    /// Open a streaming completion for a single user turn.
    /// The stream yields TextDelta fragments as they arrive, followed by Stop or Error.
    async fn open_stream(&self, prompt: &str) -> Result<FragmentStream, ApiError>;
}
