//! Model backend layer: streaming completion clients for the supported providers

mod client;
mod request;
mod sse;
mod streaming;

pub use client::ApiAgent;
pub use request::ApiRequest;
pub use sse::{parse_sse_line, SseFormat};
pub use streaming::{FragmentStream, ModelStreamClient, StreamFragment};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    /// Build a provider error from a non-success HTTP response.
    ///
    /// Only the backend's own error message is kept, never the raw body, since the
    /// result may end up in front of a chat user.
    pub fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body).ok().and_then(|json| {
            // Gemini and OpenAI nest the message under "error"; some proxies wrap it in an array
            let error = match &json {
                Value::Array(items) => items.first().map(|item| item["error"].clone()),
                other => Some(other["error"].clone()),
            }?;
            error["message"]
                .as_str()
                .or_else(|| error.as_str())
                .map(str::to_string)
        });

        match (status.as_u16(), message) {
            (401 | 403, Some(msg)) => ApiError::Auth(msg),
            (401 | 403, None) => ApiError::Auth(status.to_string()),
            (_, Some(msg)) => ApiError::Provider(format!("{}: {}", status, msg)),
            (_, None) => ApiError::Provider(status.to_string()),
        }
    }
}

/// Configuration for a model backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub provider: ProviderType,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Gemini,
    OpenAI,
    Anthropic,
    Ollama,
}

impl ProviderType {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderType::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderType::OpenAI => "https://api.openai.com/v1",
            ProviderType::Anthropic => "https://api.anthropic.com/v1",
            ProviderType::Ollama => "http://localhost:11434",
        }
    }

    pub fn sse_format(&self) -> SseFormat {
        match self {
            ProviderType::Gemini => SseFormat::Gemini,
            ProviderType::OpenAI => SseFormat::OpenAI,
            ProviderType::Anthropic => SseFormat::Anthropic,
            ProviderType::Ollama => SseFormat::Ollama,
        }
    }

    /// Ollama runs locally without credentials
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderType::Ollama)
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderType::Gemini => "gemini",
            ProviderType::OpenAI => "openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::Ollama => "ollama",
        };
        f.write_str(name)
    }
}

impl FromStr for ProviderType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderType::Gemini),
            "openai" => Ok(ProviderType::OpenAI),
            "anthropic" | "claude" => Ok(ProviderType::Anthropic),
            "ollama" => Ok(ProviderType::Ollama),
            other => Err(ApiError::Provider(format!("unknown provider '{}'", other))),
        }
    }
}
