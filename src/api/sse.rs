//! Server-Sent Events (SSE) parser for streaming model responses
//!
//! Handles four formats:
//! - Gemini: `data: {"candidates":[{"content":{"parts":[{"text":"..."}]}}]}`
//! - OpenAI: `data: {"choices":[{"delta":{"content":"..."}}]}`
//! - Anthropic: `event: content_block_delta` / `data: {"delta":{"text":"..."}}`
//! - Ollama: line-delimited JSON `{"message":{"content":"..."}}`

use super::streaming::StreamFragment;
use serde_json::Value;

/// The format of SSE events from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseFormat {
    /// Gemini `streamGenerateContent?alt=sse`
    Gemini,
    /// OpenAI-compatible chat completions
    OpenAI,
    /// Anthropic messages with event types
    Anthropic,
    /// Ollama line-delimited JSON
    Ollama,
}

/// Parse a single SSE line or data payload into the fragments it carries, in order.
///
/// A payload can hold both the last piece of text and the finish reason, so one
/// line may yield a `TextDelta` followed by a terminal fragment. Comments, empty
/// lines and event-type lines yield nothing.
pub fn parse_sse_line(line: &str, format: SseFormat) -> Vec<StreamFragment> {
    let line = line.trim();

    // Skip empty lines and SSE comments
    if line.is_empty() || line.starts_with(':') {
        return Vec::new();
    }

    match format {
        SseFormat::Gemini => parse_gemini_sse(line),
        SseFormat::OpenAI => parse_openai_sse(line),
        SseFormat::Anthropic => parse_anthropic_sse(line),
        SseFormat::Ollama => parse_ollama_line(line),
    }
}

/// Strip the `data:` field name; the space after the colon is optional
fn data_field(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?;
    Some(data.strip_prefix(' ').unwrap_or(data))
}

fn parse_json(data: &str) -> Result<Value, StreamFragment> {
    serde_json::from_str(data)
        .map_err(|e| StreamFragment::Error(format!("malformed stream payload: {}", e)))
}

/// Text (if any) followed by the terminal fragment (if any)
fn text_then(text: Option<&str>, terminal: Option<StreamFragment>) -> Vec<StreamFragment> {
    text.filter(|t| !t.is_empty())
        .map(|t| StreamFragment::TextDelta(t.to_string()))
        .into_iter()
        .chain(terminal)
        .collect()
}

fn parse_gemini_sse(line: &str) -> Vec<StreamFragment> {
    let Some(data) = data_field(line) else {
        return Vec::new();
    };

    let json = match parse_json(data) {
        Ok(v) => v,
        Err(fragment) => return vec![fragment],
    };

    if let Some(message) = json["error"]["message"].as_str() {
        return vec![StreamFragment::Error(message.to_string())];
    }

    if let Some(reason) = json["promptFeedback"]["blockReason"].as_str() {
        return vec![StreamFragment::Error(format!("prompt blocked: {}", reason))];
    }

    let candidate = &json["candidates"][0];

    // A candidate may carry several parts; they are delivered as one delta
    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();

    let terminal = match candidate["finishReason"].as_str() {
        Some("STOP") | Some("MAX_TOKENS") => Some(StreamFragment::Stop),
        Some("FINISH_REASON_UNSPECIFIED") | None => None,
        Some(reason) => Some(StreamFragment::Error(format!(
            "response stopped by the model: {}",
            reason
        ))),
    };

    text_then(Some(&text), terminal)
}

fn parse_openai_sse(line: &str) -> Vec<StreamFragment> {
    let Some(data) = data_field(line) else {
        return Vec::new();
    };

    if data.trim() == "[DONE]" {
        return vec![StreamFragment::Stop];
    }

    let json = match parse_json(data) {
        Ok(v) => v,
        Err(fragment) => return vec![fragment],
    };

    if let Some(message) = json["error"]["message"].as_str() {
        return vec![StreamFragment::Error(message.to_string())];
    }

    let choice = &json["choices"][0];
    let terminal = match choice["finish_reason"].as_str() {
        Some("stop") | Some("length") => Some(StreamFragment::Stop),
        Some("content_filter") => Some(StreamFragment::Error(
            "response stopped by the content filter".to_string(),
        )),
        _ => None,
    };

    text_then(choice["delta"]["content"].as_str(), terminal)
}

fn parse_anthropic_sse(line: &str) -> Vec<StreamFragment> {
    // Event type lines are redundant with the "type" field of the data payload
    if line.starts_with("event:") {
        return Vec::new();
    }

    let Some(data) = data_field(line) else {
        return Vec::new();
    };

    let json = match parse_json(data) {
        Ok(v) => v,
        Err(fragment) => return vec![fragment],
    };

    match json["type"].as_str().unwrap_or("") {
        "content_block_delta" => text_then(json["delta"]["text"].as_str(), None),
        "message_stop" => vec![StreamFragment::Stop],
        "error" => {
            let msg = json["error"]["message"].as_str().unwrap_or("Unknown error");
            vec![StreamFragment::Error(msg.to_string())]
        }
        _ => Vec::new(),
    }
}

fn parse_ollama_line(line: &str) -> Vec<StreamFragment> {
    let json = match parse_json(line) {
        Ok(v) => v,
        Err(fragment) => return vec![fragment],
    };

    if let Some(message) = json["error"].as_str() {
        return vec![StreamFragment::Error(message.to_string())];
    }

    // Chat format first, then the generate format
    let text = json["message"]["content"]
        .as_str()
        .filter(|t| !t.is_empty())
        .or_else(|| json["response"].as_str());

    let terminal = (json["done"].as_bool() == Some(true)).then_some(StreamFragment::Stop);

    text_then(text, terminal)
}
