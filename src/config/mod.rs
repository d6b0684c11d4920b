//! Configuration management for chat-relay
//!
//! Supports configuration via:
//! 1. Config file (~/.config/chat-relay/config.toml)
//! 2. Environment variables (TELEGRAM_BOT_TOKEN, GEMINI_API_KEY, etc.)
//! 3. CLI arguments (override file/env settings)

use crate::api::{ApiConfig, ProviderType};
use crate::chat::TelegramConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Telegram bot configuration
    pub telegram: TelegramSettings,

    /// Model backend configuration
    pub model: ModelSettings,

    /// Per-request streaming behaviour
    pub orchestrator: OrchestratorSettings,

    /// Webhook server settings
    pub server: ServerSettings,
}

/// Telegram settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    /// Bot token (can also use TELEGRAM_BOT_TOKEN env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Bot API server
    pub api_base: String,

    /// Reply to /start
    pub greeting: String,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: "https://api.telegram.org".to_string(),
            greeting: "Hi! Send me a message and I'll ask the model for you.".to_string(),
        }
    }
}

/// Model backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Backend provider (gemini, openai, anthropic, ollama)
    pub provider: ProviderType,

    /// API key (can also use MODEL_API_KEY or the provider's own env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model to use
    pub model: String,

    /// Maximum tokens for responses
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: ProviderType::Gemini,
            api_key: None,
            base_url: None,
            model: "gemini-2.0-flash".to_string(),
            max_tokens: 2048,
            temperature: 0.7,
        }
    }
}

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Refresh the draft every time the answer crosses a multiple of this many characters
    pub throttle_chars: usize,

    /// Draft text shown before the first refresh
    pub draft_placeholder: String,

    /// Sent as a normal message when drafts are unavailable
    pub processing_notice: String,

    /// Sent when the model returns no text
    pub empty_reply: String,

    /// Prefix of the message sent on failure
    pub error_prefix: String,

    /// Abort the model call after this many seconds (0 = no limit)
    pub stream_timeout_secs: u64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            throttle_chars: 50,
            draft_placeholder: "Thinking…".to_string(),
            processing_notice: "Processing your message…".to_string(),
            empty_reply: "Sorry, I couldn't come up with an answer to that.".to_string(),
            error_prefix: "Sorry, something went wrong:".to_string(),
            stream_timeout_secs: 120,
        }
    }
}

/// Webhook server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to listen on
    pub bind: String,

    /// Path Telegram posts updates to
    pub webhook_path: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            webhook_path: "/webhook".to_string(),
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chat-relay")
            .join("config.toml")
    }

    /// Load config from specific path
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default().with_env_overrides());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;

        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        // Telegram
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Ok(base) = std::env::var("TELEGRAM_API_BASE") {
            self.telegram.api_base = base;
        }

        // Model
        if let Ok(provider) = std::env::var("MODEL_PROVIDER") {
            match provider.parse() {
                Ok(provider) => self.model.provider = provider,
                Err(e) => tracing::warn!("ignoring MODEL_PROVIDER: {}", e),
            }
        }
        if let Ok(url) = std::env::var("MODEL_BASE_URL") {
            self.model.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("MODEL_NAME") {
            self.model.model = model;
        }
        if let Ok(key) = std::env::var("MODEL_API_KEY") {
            self.model.api_key = Some(key);
        }

        // Server
        if let Ok(bind) = std::env::var("RELAY_BIND") {
            self.server.bind = bind;
        }

        self
    }

    /// Save config to specific path
    pub fn save_to(&self, path: PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_bot_token().is_none() {
            return Err(ConfigError::MissingRequired(
                "Telegram bot token (TELEGRAM_BOT_TOKEN)".to_string(),
            ));
        }

        if self.model.provider.requires_api_key() && self.model_api_key().is_none() {
            return Err(ConfigError::MissingRequired(format!(
                "API key for {} (MODEL_API_KEY or {})",
                self.model.provider,
                provider_key_var(self.model.provider)
            )));
        }

        if !self.server.webhook_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "server.webhook_path must start with '/': {}",
                self.server.webhook_path
            )));
        }

        Ok(())
    }

    /// Get Telegram bot token (from config or env)
    pub fn telegram_bot_token(&self) -> Option<String> {
        configured_or_env(self.telegram.bot_token.as_ref(), "TELEGRAM_BOT_TOKEN")
    }

    /// Get model API key (from config, MODEL_API_KEY, or the provider's env var)
    pub fn model_api_key(&self) -> Option<String> {
        configured_or_env(
            self.model.api_key.as_ref(),
            provider_key_var(self.model.provider),
        )
    }

    /// Model client configuration derived from these settings
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            provider: self.model.provider,
            api_key: self.model_api_key().unwrap_or_default(),
            base_url: self.model.base_url.clone(),
            model: self.model.model.clone(),
            max_tokens: Some(self.model.max_tokens),
            temperature: Some(self.model.temperature),
        }
    }

    /// Telegram client configuration derived from these settings
    pub fn telegram_config(&self) -> Result<TelegramConfig, ConfigError> {
        let token = self.telegram_bot_token().ok_or_else(|| {
            ConfigError::MissingRequired("Telegram bot token (TELEGRAM_BOT_TOKEN)".to_string())
        })?;
        Ok(TelegramConfig::new(token).with_api_base(self.telegram.api_base.clone()))
    }

    /// Generate example config content
    pub fn example() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

fn provider_key_var(provider: ProviderType) -> &'static str {
    match provider {
        ProviderType::Gemini => "GEMINI_API_KEY",
        ProviderType::OpenAI => "OPENAI_API_KEY",
        ProviderType::Anthropic => "ANTHROPIC_API_KEY",
        ProviderType::Ollama => "OLLAMA_API_KEY",
    }
}

/// A blank configured value falls through to the environment
fn configured_or_env(configured: Option<&String>, env_var: &str) -> Option<String> {
    configured
        .filter(|value| !value.trim().is_empty())
        .cloned()
        .or_else(|| std::env::var(env_var).ok())
        .filter(|value| !value.trim().is_empty())
}

/// Builder for creating Config programmatically
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn telegram_bot_token(mut self, token: impl Into<String>) -> Self {
        self.config.telegram.bot_token = Some(token.into());
        self
    }

    pub fn provider(mut self, provider: ProviderType) -> Self {
        self.config.model.provider = provider;
        self
    }

    pub fn model_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.model.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model.model = model.into();
        self
    }

    pub fn throttle_chars(mut self, chars: usize) -> Self {
        self.config.orchestrator.throttle_chars = chars;
        self
    }

    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        self.config.server.bind = bind.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.provider, ProviderType::Gemini);
        assert_eq!(config.orchestrator.throttle_chars, 50);
        assert_eq!(config.server.webhook_path, "/webhook");
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .telegram_bot_token("123:abc")
            .provider(ProviderType::OpenAI)
            .model_api_key("sk-test")
            .model("gpt-4o-mini")
            .throttle_chars(80)
            .build();

        assert_eq!(config.telegram_bot_token(), Some("123:abc".to_string()));
        assert_eq!(config.api_config().provider, ProviderType::OpenAI);
        assert_eq!(config.api_config().api_key, "sk-test");
        assert_eq!(config.orchestrator.throttle_chars, 80);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [model]
            provider = "anthropic"
            model = "claude-sonnet-4-20250514"

            [orchestrator]
            throttle_chars = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.model.provider, ProviderType::Anthropic);
        assert_eq!(config.model.max_tokens, 2048);
        assert_eq!(config.orchestrator.throttle_chars, 100);
        assert_eq!(config.orchestrator.stream_timeout_secs, 120);
    }

    #[test]
    fn test_invalid_webhook_path_rejected() {
        let mut config = ConfigBuilder::new()
            .telegram_bot_token("t")
            .model_api_key("k")
            .build();
        config.server.webhook_path = "webhook".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_blank_configured_value_falls_back_to_env() {
        std::env::set_var("CHAT_RELAY_TEST_FALLBACK_KEY", "from-env");

        let blank = "  ".to_string();
        let set = "from-file".to_string();
        assert_eq!(
            configured_or_env(Some(&blank), "CHAT_RELAY_TEST_FALLBACK_KEY"),
            Some("from-env".to_string())
        );
        assert_eq!(
            configured_or_env(Some(&set), "CHAT_RELAY_TEST_FALLBACK_KEY"),
            Some("from-file".to_string())
        );
        assert_eq!(configured_or_env(Some(&blank), "CHAT_RELAY_TEST_UNSET_KEY"), None);
    }

    #[test]
    fn test_example_config() {
        let example = Config::example();
        assert!(example.contains("[telegram]"));
        assert!(example.contains("[model]"));
        assert!(example.contains("[orchestrator]"));
    }
}
