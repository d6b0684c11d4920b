//! HTTP streaming client for model backends

use super::request::ApiRequest;
use super::sse::{parse_sse_line, SseFormat};
use super::streaming::{FragmentStream, ModelStreamClient, StreamFragment};
use super::{ApiConfig, ApiError, ProviderType};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Streaming model client for any supported provider
pub struct ApiAgent {
    config: ApiConfig,
    client: Client,
}

impl ApiAgent {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        Self::with_client(config, Client::new())
    }

    /// Share an existing connection pool
    pub fn with_client(config: ApiConfig, client: Client) -> Result<Self, ApiError> {
        if config.provider.requires_api_key() && config.api_key.trim().is_empty() {
            return Err(ApiError::Auth(format!(
                "no API key configured for {}",
                config.provider
            )));
        }

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.config.provider {
            ProviderType::Gemini => builder.header("x-goog-api-key", &self.config.api_key),
            ProviderType::Anthropic => builder
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            ProviderType::OpenAI => builder.bearer_auth(&self.config.api_key),
            ProviderType::Ollama if self.config.api_key.is_empty() => builder,
            ProviderType::Ollama => builder.bearer_auth(&self.config.api_key),
        }
    }
}

#[async_trait]
impl ModelStreamClient for ApiAgent {
    async fn open_stream(&self, prompt: &str) -> Result<FragmentStream, ApiError> {
        let request = ApiRequest::new(prompt);
        let url = request.endpoint(&self.config);
        let body = request.body(&self.config);
        let sse_format = self.config.provider.sse_format();

        debug!(provider = %self.config.provider, model = %self.config.model, "opening model stream");

        let response = self
            .authorize(self.client.post(&url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status, &error_text));
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(pump_stream(response, sse_format, tx));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Forward parsed fragments until the first terminal one.
///
/// Every provider finishes a complete answer with a marker (`[DONE]`,
/// `message_stop`, a finish reason or `done: true`), so a body that ends
/// without one is reported as an error. The task gives up on the response as
/// soon as the receiver is dropped, which closes the backend connection.
async fn pump_stream(response: Response, format: SseFormat, tx: mpsc::Sender<StreamFragment>) {
    let mut stream = response.bytes_stream();
    let mut lines = LineBuffer::default();

    loop {
        let chunk = tokio::select! {
            _ = tx.closed() => {
                debug!("model stream abandoned by the receiver");
                return;
            }
            chunk = stream.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                lines.push(&bytes);
                while let Some(line) = lines.next_line() {
                    if forward(&tx, parse_sse_line(&line, format)).await {
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                let _ = tx
                    .send(StreamFragment::Error(format!("stream interrupted: {}", e)))
                    .await;
                return;
            }
            None => break,
        }
    }

    // A final line without a trailing newline still counts
    if let Some(line) = lines.take_rest() {
        if forward(&tx, parse_sse_line(&line, format)).await {
            return;
        }
    }

    warn!("model stream ended without an end marker");
    let _ = tx
        .send(StreamFragment::Error(
            "model stream ended without an end marker".to_string(),
        ))
        .await;
}

/// Send fragments in order; true once nothing more should be sent
async fn forward(tx: &mpsc::Sender<StreamFragment>, fragments: Vec<StreamFragment>) -> bool {
    for fragment in fragments {
        let terminal = fragment.is_terminal();
        if tx.send(fragment).await.is_err() || terminal {
            return true;
        }
    }
    false
}

/// Splits a byte stream into lines without breaking multi-byte characters
/// that straddle network chunks.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    fn next_line(&mut self) -> Option<String> {
        let newline_pos = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=newline_pos).collect();
        Some(String::from_utf8_lossy(&line[..newline_pos]).into_owned())
    }

    fn take_rest(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}
