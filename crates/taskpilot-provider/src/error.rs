//! Error types for the taskpilot-provider crate.

use crate::types::ServiceType;
use serde_json::Value;
use std::error::Error as _;
use std::io;

/// Phrases backends use when a model cannot do tool/function calling.
const TOOLS_UNSUPPORTED_PHRASES: &[&str] = &[
    "does not support tools",
    "does not support tool use",
    "does not support function calling",
    "tool use is not supported",
    "tool use not supported",
    "tools are not supported",
    "tools not supported",
    "function calling is not supported",
    "function calling not supported",
    "tool_choice is not supported",
    "no endpoints found that support tool use",
];

/// Errors that can occur in LLM provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed before a response arrived (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    ///
    /// `body` holds the parsed JSON body when the backend returned one.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    /// Backend rejected the credential.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Backend rejected the model id.
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Backend answered but produced no usable content.
    #[error("Empty response: {0}")]
    EmptyResponse(String),

    /// Model or backend lacks a capability the request needs.
    #[error("{provider} model '{model}' does not support {capability}: {message}")]
    UnsupportedCapability {
        provider: String,
        model: String,
        capability: ServiceType,
        message: String,
    },

    /// The forced tool call came back under a different name.
    #[error("Expected object '{expected}' but the model returned '{actual}'")]
    ObjectNameMismatch { expected: String, actual: String },

    /// Structured output was missing, unparsable or failed schema validation.
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// Stream parsing error
    #[error("Stream error: {0}")]
    StreamError(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Build an error from a non-success HTTP response body.
    pub fn from_response(status: u16, body_text: String) -> Self {
        let body = serde_json::from_str::<Value>(&body_text).ok();
        match status {
            401 | 403 => Self::Auth(body_text),
            _ => Self::Api {
                status,
                message: body_text,
                body,
            },
        }
    }

    /// HTTP-like status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Auth(_) => Some(401),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the connection failed, dropped, or timed out before a full
    /// response arrived.
    pub fn is_network_failure(&self) -> bool {
        let Self::Http(error) = self else {
            return false;
        };
        if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
            return true;
        }

        let mut source = error.source();
        while let Some(cause) = source {
            if let Some(io_error) = cause.downcast_ref::<io::Error>() {
                if matches!(
                    io_error.kind(),
                    io::ErrorKind::ConnectionReset
                        | io::ErrorKind::ConnectionAborted
                        | io::ErrorKind::BrokenPipe
                        | io::ErrorKind::UnexpectedEof
                ) {
                    return true;
                }
            }
            source = cause.source();
        }
        false
    }

    /// Re-tag an error as a structured-output capability failure when the
    /// backend's message says tool calling is unsupported.
    pub fn tag_unsupported_tools(self, provider: &str, model: &str) -> Self {
        let message = self.to_string();
        if mentions_unsupported_tools(&message) {
            Self::UnsupportedCapability {
                provider: provider.to_string(),
                model: model.to_string(),
                capability: ServiceType::GenerateObject,
                message,
            }
        } else {
            self
        }
    }
}

/// Whether a message says the model cannot do tool/function calling.
pub fn mentions_unsupported_tools(message: &str) -> bool {
    let lower = message.to_lowercase();
    TOOLS_UNSUPPORTED_PHRASES.iter().any(|p| lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_parses_json_body() {
        let err = ProviderError::from_response(
            429,
            r#"{"error":{"message":"Rate limit reached"}}"#.to_string(),
        );
        match err {
            ProviderError::Api { status, body, .. } => {
                assert_eq!(status, 429);
                assert_eq!(body.unwrap()["error"]["message"], "Rate limit reached");
            }
            other => panic!("Expected Api, got: {other:?}"),
        }
    }

    #[test]
    fn test_from_response_auth() {
        let err = ProviderError::from_response(401, "invalid x-api-key".to_string());
        assert!(matches!(err, ProviderError::Auth(_)));
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_tag_unsupported_tools() {
        let err = ProviderError::from_response(
            400,
            r#"{"error":{"message":"llama2 does not support tools"}}"#.to_string(),
        )
        .tag_unsupported_tools("ollama", "llama2");
        match err {
            ProviderError::UnsupportedCapability {
                model, capability, ..
            } => {
                assert_eq!(model, "llama2");
                assert_eq!(capability, ServiceType::GenerateObject);
            }
            other => panic!("Expected UnsupportedCapability, got: {other:?}"),
        }
    }

    #[test]
    fn test_tag_leaves_other_errors() {
        let err = ProviderError::InvalidModel("gpt-9".to_string())
            .tag_unsupported_tools("openai", "gpt-9");
        assert!(matches!(err, ProviderError::InvalidModel(_)));
    }

    #[tokio::test]
    async fn test_dropped_connection_is_network_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let err = reqwest::Client::new()
            .post(format!("http://{addr}/v1/chat/completions"))
            .body("{}")
            .send()
            .await
            .unwrap_err();
        assert!(ProviderError::Http(err).is_network_failure());
        assert!(!ProviderError::EmptyResponse("nothing".to_string()).is_network_failure());
    }

    #[test]
    fn test_mentions_unsupported_tools_case_insensitive() {
        assert!(mentions_unsupported_tools("Tool use is NOT supported for this model"));
        assert!(!mentions_unsupported_tools("context length exceeded"));
    }
}
