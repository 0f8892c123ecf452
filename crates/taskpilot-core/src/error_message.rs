//! Flatten provider failures into one readable line.

use serde_json::Value;
use taskpilot_provider::ProviderError;

/// JSON pointers tried in order against an error body.
const MESSAGE_POINTERS: &[&str] = &["/data/error/message", "/error/message", "/message", "/error"];

fn message_from_value(value: &Value) -> Option<String> {
    for pointer in MESSAGE_POINTERS {
        if let Some(message) = value.pointer(pointer).and_then(Value::as_str) {
            if !message.trim().is_empty() {
                return Some(message.to_string());
            }
        }
    }

    // Some SDK wrappers embed the backend body as a JSON string.
    let embedded = value.get("responseBody").and_then(Value::as_str)?;
    let parsed: Value = serde_json::from_str(embedded).ok()?;
    message_from_value(&parsed)
}

fn message_from_text(text: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(text).ok()?;
    message_from_value(&parsed)
}

/// Best human-readable message for `error`.
///
/// Structured bodies are searched for `data.error.message`, `error.message`,
/// `message`, a string `error`, then a JSON-encoded `responseBody`. Anything
/// else falls back to the error's own text.
pub fn extract_error_message(error: &ProviderError) -> String {
    let found = match error {
        ProviderError::Api { body, message, .. } => body
            .as_ref()
            .and_then(message_from_value)
            .or_else(|| message_from_text(message)),
        ProviderError::Auth(text) => message_from_text(text),
        ProviderError::StreamError(text) => message_from_text(text),
        _ => None,
    };

    found.unwrap_or_else(|| match error {
        ProviderError::Api { message, .. } if !message.trim().is_empty() => message.clone(),
        other => other.to_string(),
    })
}
