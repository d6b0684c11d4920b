//! Completion request construction

use super::{ApiConfig, ProviderType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A single-turn completion request.
///
/// The prompt is sent as one user turn with no history and no system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRequest {
    pub prompt: String,
}

impl ApiRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }

    /// Streaming endpoint for the configured provider
    pub fn endpoint(&self, config: &ApiConfig) -> String {
        let base = config
            .base_url
            .as_deref()
            .unwrap_or_else(|| config.provider.default_base_url())
            .trim_end_matches('/');

        match config.provider {
            ProviderType::Gemini => format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                base, config.model
            ),
            ProviderType::OpenAI => format!("{}/chat/completions", base),
            ProviderType::Anthropic => format!("{}/messages", base),
            ProviderType::Ollama => format!("{}/api/chat", base),
        }
    }

    /// JSON body for the configured provider, with streaming enabled
    pub fn body(&self, config: &ApiConfig) -> Value {
        match config.provider {
            ProviderType::Gemini => self.gemini_body(config),
            ProviderType::Anthropic => self.anthropic_body(config),
            ProviderType::OpenAI | ProviderType::Ollama => self.openai_body(config),
        }
    }

    fn gemini_body(&self, config: &ApiConfig) -> Value {
        let mut generation = json!({});
        if let Some(max_tokens) = config.max_tokens {
            generation["maxOutputTokens"] = json!(max_tokens);
        }
        if let Some(temp) = config.temperature {
            generation["temperature"] = json!(temp);
        }

        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": self.prompt }]
            }],
            "generationConfig": generation,
        })
    }

    fn anthropic_body(&self, config: &ApiConfig) -> Value {
        let mut body = json!({
            "model": config.model,
            "messages": [{ "role": "user", "content": self.prompt }],
            // Anthropic rejects requests without max_tokens
            "max_tokens": config.max_tokens.unwrap_or(4096),
            "stream": true,
        });

        if let Some(temp) = config.temperature {
            body["temperature"] = json!(temp);
        }

        body
    }

    fn openai_body(&self, config: &ApiConfig) -> Value {
        let mut body = json!({
            "model": config.model,
            "messages": [{ "role": "user", "content": self.prompt }],
            "stream": true,
        });

        if let Some(max_tokens) = config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(temp) = config.temperature {
            body["temperature"] = json!(temp);
        }

        body
    }
}
