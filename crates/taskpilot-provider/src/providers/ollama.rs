//! Ollama adapter for locally hosted models.

use crate::providers::openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};

/// Default local endpoint of Ollama's OpenAI-compatible API.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Create the Ollama adapter.
///
/// Needs no credential. Any locally pulled model id is accepted; whether it
/// can do tool calling is only known once the server answers.
pub fn new_ollama_provider() -> OpenAiCompatProvider {
    let config = OpenAiCompatConfig {
        provider_name: "ollama".to_string(),
        base_url: OLLAMA_BASE_URL.to_string(),
        api_key_env: "OLLAMA_API_KEY".to_string(),
        requires_api_key: false,
        models: Vec::new(),
    };

    OpenAiCompatProvider::new(config)
}
