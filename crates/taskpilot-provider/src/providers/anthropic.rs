//! Anthropic Claude adapter.
//!
//! Implements the adapter contract for Anthropic's Messages API, with SSE
//! streaming and forced `tool_use` for structured output.

use crate::error::ProviderError;
use crate::schema::{sanitize_schema, validate_object};
use crate::sse;
use crate::stream::TextStream;
use crate::traits::ProviderAdapter;
use crate::types::{
    MessageRole, ModelInfo, ObjectResult, ObjectSpec, ProviderRequest, StopReason, StreamEvent,
    TextResult, Usage,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

const API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8_192;

/// Anthropic Claude adapter.
pub struct AnthropicProvider {
    client: Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic adapter.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn endpoint(request: &ProviderRequest) -> String {
        let base = request.base_url.as_deref().unwrap_or(API_BASE);
        let base = base.trim_end_matches('/');
        // Accept base URLs given with or without the version segment.
        if base.ends_with("/v1") {
            format!("{base}/messages")
        } else {
            format!("{base}/v1/messages")
        }
    }

    /// Convert a request into the Anthropic API request body.
    fn build_request_body(request: &ProviderRequest, stream: bool) -> Value {
        // System turns go in the top-level `system` field.
        let messages: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .map(|m| {
                json!({
                    "role": "user",
                    "content": [{"type": "text", "text": m.content}],
                })
            })
            .collect();

        let mut body = json!({
            "model": request.model_id,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "stream": stream,
        });

        if let Some(system) = request.system_prompt() {
            body["system"] = json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }

        body
    }

    /// Body that forces a `tool_use` block named `object.name`.
    fn build_object_body(request: &ProviderRequest, object: &ObjectSpec) -> Value {
        let mut body = Self::build_request_body(request, false);
        body["tools"] = json!([{
            "name": object.name,
            "description": format!("Respond with a {} object.", object.name),
            "input_schema": sanitize_schema(&object.schema),
        }]);
        body["tool_choice"] = json!({"type": "tool", "name": object.name});
        body
    }

    async fn post(
        &self,
        request: &ProviderRequest,
        body: &Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut builder = self
            .client
            .post(Self::endpoint(request))
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(body);
        if let Some(ref api_key) = request.api_key {
            builder = builder.header("x-api-key", api_key);
        }

        debug!(model = %request.model_id, "Sending anthropic request");
        let response = builder.send().await.map_err(ProviderError::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, model = %request.model_id, "anthropic request failed");
            return Err(ProviderError::from_response(status, error_body));
        }

        Ok(response)
    }

    /// Parse an Anthropic SSE event into stream events.
    fn parse_sse_event(event: &AnthropicEvent) -> Vec<StreamEvent> {
        match event {
            AnthropicEvent::ContentBlockDelta { delta, .. } => match delta {
                Delta::Text { text } => {
                    vec![StreamEvent::TextDelta {
                        delta: text.clone(),
                    }]
                }
                Delta::Other => vec![],
            },
            AnthropicEvent::MessageStart { message } => {
                let mut events = Vec::new();
                if let Some(usage) = &message.usage {
                    events.push(StreamEvent::Usage {
                        input: usage.input_tokens.unwrap_or(0),
                        output: usage.output_tokens.unwrap_or(0),
                    });
                }
                events
            }
            AnthropicEvent::MessageDelta { delta, usage } => {
                let mut events = Vec::new();
                if let Some(usage) = usage {
                    events.push(StreamEvent::Usage {
                        input: usage.input_tokens.unwrap_or(0),
                        output: usage.output_tokens.unwrap_or(0),
                    });
                }
                if let Some(reason) = &delta.stop_reason {
                    events.push(StreamEvent::Done {
                        reason: StopReason::from_api(reason),
                    });
                }
                events
            }
            AnthropicEvent::Error { error } => {
                vec![StreamEvent::Error(format!(
                    "{}: {}",
                    error.error_type, error.message
                ))]
            }
            AnthropicEvent::ContentBlockStart
            | AnthropicEvent::ContentBlockStop
            | AnthropicEvent::MessageStop
            | AnthropicEvent::Ping => vec![],
        }
    }

    fn extract_text(resp: &MessagesResponse) -> String {
        resp.content
            .iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    fn extract_object(resp: &MessagesResponse, expected: &str) -> Result<Value, ProviderError> {
        let (name, input) = resp
            .content
            .iter()
            .find_map(|block| match block {
                ResponseBlock::ToolUse { name, input } => Some((name, input)),
                _ => None,
            })
            .ok_or_else(|| {
                ProviderError::InvalidObject(format!(
                    "model answered with text instead of calling '{expected}'"
                ))
            })?;

        if name != expected {
            return Err(ProviderError::ObjectNameMismatch {
                expected: expected.to_string(),
                actual: name.clone(),
            });
        }
        Ok(input.clone())
    }
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo::new("claude-sonnet-4-20250514", "Claude Sonnet 4", 64_000),
            ModelInfo::new("claude-opus-4-20250514", "Claude Opus 4", 32_000),
            ModelInfo::new("claude-3-7-sonnet-20250219", "Claude 3.7 Sonnet", 64_000),
            ModelInfo::new("claude-3-5-haiku-20241022", "Claude 3.5 Haiku", 8_192),
        ]
    }

    fn api_key_env_var(&self) -> &str {
        "ANTHROPIC_API_KEY"
    }

    async fn generate_text(&self, request: ProviderRequest) -> Result<TextResult, ProviderError> {
        let body = Self::build_request_body(&request, false);
        let response = self.post(&request, &body).await?;
        let resp: MessagesResponse = response.json().await.map_err(ProviderError::Http)?;

        let text = Self::extract_text(&resp);
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse(format!(
                "anthropic returned no text for model '{}'",
                request.model_id
            )));
        }

        Ok(TextResult {
            text,
            usage: resp.usage.map(Usage::from),
        })
    }

    async fn stream_text(&self, request: ProviderRequest) -> Result<TextStream, ProviderError> {
        let body = Self::build_request_body(&request, true);
        let response = self.post(&request, &body).await?;

        let events = sse::data_stream(response.bytes_stream()).flat_map(|payload| {
            let events: Vec<Result<StreamEvent, ProviderError>> = match payload {
                Ok(data) => match serde_json::from_str::<AnthropicEvent>(&data) {
                    Ok(event) => Self::parse_sse_event(&event).into_iter().map(Ok).collect(),
                    // Skip unparseable events
                    Err(_) => vec![],
                },
                Err(e) => vec![Err(e)],
            };
            stream::iter(events)
        });

        Ok(TextStream::new(events.boxed()))
    }

    async fn generate_object(
        &self,
        request: ProviderRequest,
    ) -> Result<ObjectResult, ProviderError> {
        let object = request.object.clone().ok_or_else(|| {
            ProviderError::InvalidObject("generate_object requires a schema".to_string())
        })?;

        let body = Self::build_object_body(&request, &object);
        let response = self
            .post(&request, &body)
            .await
            .map_err(|e| e.tag_unsupported_tools(self.name(), &request.model_id))?;
        let resp: MessagesResponse = response.json().await.map_err(ProviderError::Http)?;

        let value = Self::extract_object(&resp, &object.name)?;
        validate_object(&object.schema, &value)?;

        Ok(ObjectResult {
            object: value,
            usage: resp.usage.map(Usage::from),
        })
    }
}

// ──────────────────────────────────────────────────────────
// Anthropic wire types (internal)
// ──────────────────────────────────────────────────────────

/// Top-level SSE event from the Anthropic API.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: MessageStartData },

    #[serde(rename = "content_block_start")]
    ContentBlockStart,

    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: Delta },

    #[serde(rename = "content_block_stop")]
    ContentBlockStop,

    #[serde(rename = "message_delta")]
    MessageDelta {
        delta: MessageDeltaData,
        #[serde(default)]
        usage: Option<UsageData>,
    },

    #[serde(rename = "message_stop")]
    MessageStop,

    #[serde(rename = "ping")]
    Ping,

    #[serde(rename = "error")]
    Error { error: ErrorData },
}

#[derive(Debug, Deserialize)]
struct MessageStartData {
    #[serde(default)]
    usage: Option<UsageData>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Delta {
    #[serde(rename = "text_delta")]
    Text { text: String },

    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaData {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageData {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
}

impl From<UsageData> for Usage {
    fn from(u: UsageData) -> Self {
        Usage {
            input_tokens: u.input_tokens.unwrap_or(0),
            output_tokens: u.output_tokens.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorData {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}

/// Non-streaming Messages API response.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    usage: Option<UsageData>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse { name: String, input: Value },

    #[serde(other)]
    Other,
}

// ──────────────────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────────────────
