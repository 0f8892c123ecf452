//! Generic OpenAI-compatible adapter.
//!
//! Handles the OpenAI chat completions API format used by OpenAI, OpenRouter,
//! Perplexity, xAI, Ollama and many other providers. Structured output is
//! produced by forcing a single function call.

use crate::error::ProviderError;
use crate::schema::{sanitize_schema, validate_object};
use crate::sse;
use crate::stream::TextStream;
use crate::traits::ProviderAdapter;
use crate::types::{
    ModelInfo, ObjectResult, ObjectSpec, ProviderRequest, ServiceType, StopReason, StreamEvent,
    TextResult, Usage,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Configuration for an OpenAI-compatible adapter.
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    pub provider_name: String,
    pub base_url: String,
    pub api_key_env: String,
    pub requires_api_key: bool,
    pub models: Vec<ModelInfo>,
}

/// An adapter that speaks the OpenAI chat completions protocol.
pub struct OpenAiCompatProvider {
    config: OpenAiCompatConfig,
    client: Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible adapter.
    pub fn new(config: OpenAiCompatConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn endpoint(&self, request: &ProviderRequest) -> String {
        let base = request
            .base_url
            .as_deref()
            .unwrap_or(&self.config.base_url);
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }

    /// Build the JSON request body.
    fn build_request_body(&self, request: &ProviderRequest, stream: bool) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
            .collect();

        let mut body = json!({
            "model": request.model_id,
            "messages": messages,
            "stream": stream,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if stream {
            body["stream_options"] = json!({"include_usage": true});
        }

        body
    }

    /// Body that forces a single call to the `object.name` function.
    fn build_object_body(&self, request: &ProviderRequest, object: &ObjectSpec) -> Value {
        let mut body = self.build_request_body(request, false);
        body["tools"] = json!([{
            "type": "function",
            "function": {
                "name": object.name,
                "description": format!("Respond with a {} object.", object.name),
                "parameters": sanitize_schema(&object.schema),
            }
        }]);
        body["tool_choice"] = json!({
            "type": "function",
            "function": {"name": object.name},
        });
        body
    }

    async fn post(
        &self,
        request: &ProviderRequest,
        body: &Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut builder = self
            .client
            .post(self.endpoint(request))
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(ref api_key) = request.api_key {
            builder = builder.bearer_auth(api_key);
        }

        debug!(
            provider = %self.config.provider_name,
            model = %request.model_id,
            "Sending chat completions request"
        );
        let response = builder.send().await.map_err(ProviderError::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!(
                provider = %self.config.provider_name,
                status,
                model = %request.model_id,
                "Chat completions request failed"
            );
            return Err(ProviderError::from_response(status, body));
        }

        Ok(response)
    }

    /// Parse one SSE data payload into stream events.
    fn parse_sse_event(data: &str) -> Vec<StreamEvent> {
        if data == "[DONE]" {
            return vec![StreamEvent::Done {
                reason: StopReason::EndTurn,
            }];
        }

        let chunk: OpenAiChunk = match serde_json::from_str(data) {
            Ok(c) => c,
            Err(_) => return vec![],
        };

        if let Some(error) = chunk.error {
            return vec![StreamEvent::Error(error.message)];
        }

        let mut events = Vec::new();

        for choice in &chunk.choices {
            if let Some(ref content) = choice.delta.content {
                if !content.is_empty() {
                    events.push(StreamEvent::TextDelta {
                        delta: content.clone(),
                    });
                }
            }

            if let Some(ref reason) = choice.finish_reason {
                events.push(StreamEvent::Done {
                    reason: StopReason::from_api(reason),
                });
            }
        }

        // With include_usage the last chunk carries usage and no choices.
        if let Some(usage) = chunk.usage {
            events.push(StreamEvent::Usage {
                input: usage.prompt_tokens,
                output: usage.completion_tokens,
            });
        }

        events
    }

    /// Pull the forced function call's arguments out of a response.
    fn extract_object(resp: &OpenAiResponse, expected: &str) -> Result<Value, ProviderError> {
        let choice = resp
            .choices
            .first()
            .ok_or_else(|| ProviderError::EmptyResponse("No choices in response".to_string()))?;

        let call = choice
            .message
            .tool_calls
            .as_ref()
            .and_then(|calls| calls.first())
            .ok_or_else(|| {
                ProviderError::InvalidObject(format!(
                    "model answered with text instead of calling '{expected}'"
                ))
            })?;

        if call.function.name != expected {
            return Err(ProviderError::ObjectNameMismatch {
                expected: expected.to_string(),
                actual: call.function.name.clone(),
            });
        }

        serde_json::from_str(&call.function.arguments).map_err(|e| {
            ProviderError::InvalidObject(format!("tool arguments are not valid JSON: {e}"))
        })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.config.provider_name
    }

    fn models(&self) -> Vec<ModelInfo> {
        self.config.models.clone()
    }

    fn api_key_env_var(&self) -> &str {
        &self.config.api_key_env
    }

    fn requires_api_key(&self) -> bool {
        self.config.requires_api_key
    }

    async fn generate_text(&self, request: ProviderRequest) -> Result<TextResult, ProviderError> {
        let body = self.build_request_body(&request, false);
        let response = self.post(&request, &body).await?;
        let resp: OpenAiResponse = response.json().await.map_err(ProviderError::Http)?;

        let text = resp
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ProviderError::EmptyResponse(format!(
                    "{} returned no text for model '{}'",
                    self.config.provider_name, request.model_id
                ))
            })?;

        Ok(TextResult {
            text,
            usage: resp.usage.map(Usage::from),
        })
    }

    async fn stream_text(&self, request: ProviderRequest) -> Result<TextStream, ProviderError> {
        let body = self.build_request_body(&request, true);
        let response = self.post(&request, &body).await?;

        let events = sse::data_stream(response.bytes_stream()).flat_map(|payload| {
            let events: Vec<Result<StreamEvent, ProviderError>> = match payload {
                Ok(data) => Self::parse_sse_event(&data).into_iter().map(Ok).collect(),
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

        if let Some(info) = self.model_info(&request.model_id) {
            if !info.supports_structured_output {
                return Err(ProviderError::UnsupportedCapability {
                    provider: self.config.provider_name.clone(),
                    model: request.model_id.clone(),
                    capability: ServiceType::GenerateObject,
                    message: "tool use is not supported by this model".to_string(),
                });
            }
        }

        let body = self.build_object_body(&request, &object);
        let response = self
            .post(&request, &body)
            .await
            .map_err(|e| e.tag_unsupported_tools(&self.config.provider_name, &request.model_id))?;
        let resp: OpenAiResponse = response.json().await.map_err(ProviderError::Http)?;

        let value = Self::extract_object(&resp, &object.name)?;
        validate_object(&object.schema, &value)?;

        Ok(ObjectResult {
            object: value,
            usage: resp.usage.map(Usage::from),
        })
    }
}

// -- OpenAI response types for deserialization --

#[derive(Debug, Deserialize)]
struct OpenAiChunk {
    #[serde(default)]
    choices: Vec<OpenAiChunkChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    #[serde(default)]
    error: Option<OpenAiStreamError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChunkChoice {
    delta: OpenAiDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiResponseChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    function: OpenAiFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl From<OpenAiUsage> for Usage {
    fn from(u: OpenAiUsage) -> Self {
        Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }
    }
}
