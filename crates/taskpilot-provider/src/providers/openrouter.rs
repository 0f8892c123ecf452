//! OpenRouter adapter built on the OpenAI-compatible transport.

use crate::providers::openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
use crate::types::ModelInfo;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Create the OpenRouter adapter.
///
/// OpenRouter routes to many upstream models; ids not listed here are passed
/// through unchanged. Reads its credential from `OPENROUTER_API_KEY`.
pub fn new_openrouter_provider() -> OpenAiCompatProvider {
    let config = OpenAiCompatConfig {
        provider_name: "openrouter".to_string(),
        base_url: OPENROUTER_BASE_URL.to_string(),
        api_key_env: "OPENROUTER_API_KEY".to_string(),
        requires_api_key: true,
        models: vec![
            ModelInfo::new("anthropic/claude-sonnet-4", "Claude Sonnet 4", 64_000),
            ModelInfo::new("openai/gpt-4o", "GPT-4o", 16_384),
            ModelInfo::new("google/gemini-2.5-pro", "Gemini 2.5 Pro", 65_536),
            ModelInfo::new("deepseek/deepseek-chat-v3-0324:free", "DeepSeek V3 (free)", 163_840)
                .text_only(),
        ],
    };

    OpenAiCompatProvider::new(config)
}
