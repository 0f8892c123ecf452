//! Common types used by the adapter trait and implementations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The three operations an adapter can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceType {
    /// Single text completion.
    GenerateText,
    /// Incremental text completion.
    StreamText,
    /// Schema-conforming object via forced tool calling.
    GenerateObject,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateText => "generateText",
            Self::StreamText => "streamText",
            Self::GenerateObject => "generateObject",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
        }
    }
}

/// One conversation turn sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Schema and tool name for structured output.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSpec {
    /// JSON Schema the object must satisfy.
    pub schema: Value,
    /// Name of the forced tool; the response must use the same name.
    pub name: String,
}

/// Provider-neutral request, built once per call.
#[derive(Clone)]
pub struct ProviderRequest {
    /// Credential, `None` for providers that need none.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model_id: String,
    /// Conversation, never empty.
    pub messages: Vec<Message>,
    /// Maximum tokens in the response.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Endpoint override.
    pub base_url: Option<String>,
    /// Present for `generate_object`.
    pub object: Option<ObjectSpec>,
}

impl ProviderRequest {
    /// Concatenated system messages, if any.
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

impl fmt::Debug for ProviderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRequest")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model_id", &self.model_id)
            .field("messages", &self.messages.len())
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("base_url", &self.base_url)
            .field("object", &self.object.as_ref().map(|o| o.name.as_str()))
            .finish()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens generated.
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Result of `generate_text`.
#[derive(Debug, Clone)]
pub struct TextResult {
    pub text: String,
    pub usage: Option<Usage>,
}

/// Result of `generate_object`.
#[derive(Debug, Clone)]
pub struct ObjectResult {
    pub object: Value,
    pub usage: Option<Usage>,
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Normal end of response.
    EndTurn,
    /// Model wants to use a tool.
    ToolUse,
    /// Max tokens reached.
    MaxTokens,
    /// Stop sequence matched.
    StopSequence,
}

impl StopReason {
    /// Map the stop/finish reason strings both API families use.
    pub fn from_api(reason: &str) -> Self {
        match reason {
            "tool_use" | "tool_calls" => Self::ToolUse,
            "max_tokens" | "length" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            _ => Self::EndTurn,
        }
    }
}

/// Events emitted by an adapter's raw stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk of text output.
    TextDelta { delta: String },
    /// Token usage update.
    Usage { input: u64, output: u64 },
    /// Model finished generating; usage may still follow.
    Done { reason: StopReason },
    /// Backend reported an error mid-stream.
    Error(String),
}

/// Information about a model supported by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier (e.g., "claude-sonnet-4-20250514").
    pub id: String,
    /// Human-readable model name.
    pub name: String,
    /// Maximum output tokens.
    pub max_output_tokens: u32,
    /// Whether the model can produce structured output via tool calling.
    pub supports_structured_output: bool,
}

impl ModelInfo {
    pub fn new(id: &str, name: &str, max_output_tokens: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            max_output_tokens,
            supports_structured_output: true,
        }
    }

    /// Mark the model as unable to do tool calling.
    pub fn text_only(mut self) -> Self {
        self.supports_structured_output = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ProviderRequest {
        ProviderRequest {
            api_key: Some("sk-secret-value".to_string()),
            model_id: "gpt-4o".to_string(),
            messages: vec![Message::system("Be brief."), Message::user("Hi")],
            max_tokens: Some(100),
            temperature: Some(0.2),
            base_url: None,
            object: None,
        }
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let rendered = format!("{:?}", request());
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_system_prompt_joins_system_messages() {
        let mut req = request();
        req.messages.insert(1, Message::system("Use JSON."));
        assert_eq!(req.system_prompt().as_deref(), Some("Be brief.\n\nUse JSON."));
    }

    #[test]
    fn test_stop_reason_from_api() {
        assert_eq!(StopReason::from_api("tool_calls"), StopReason::ToolUse);
        assert_eq!(StopReason::from_api("length"), StopReason::MaxTokens);
        assert_eq!(StopReason::from_api("end_turn"), StopReason::EndTurn);
    }

    #[test]
    fn test_service_type_serializes_camel_case() {
        let json = serde_json::to_string(&ServiceType::GenerateObject).unwrap();
        assert_eq!(json, "\"generateObject\"");
    }
}
