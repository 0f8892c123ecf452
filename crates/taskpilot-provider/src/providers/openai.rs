//! OpenAI adapter built on the OpenAI-compatible transport.

use crate::providers::openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
use crate::types::ModelInfo;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Create the OpenAI adapter.
///
/// Reads its credential from `OPENAI_API_KEY`.
pub fn new_openai_provider() -> OpenAiCompatProvider {
    let config = OpenAiCompatConfig {
        provider_name: "openai".to_string(),
        base_url: OPENAI_BASE_URL.to_string(),
        api_key_env: "OPENAI_API_KEY".to_string(),
        requires_api_key: true,
        models: vec![
            ModelInfo::new("gpt-4o", "GPT-4o", 16_384),
            ModelInfo::new("gpt-4o-mini", "GPT-4o mini", 16_384),
            ModelInfo::new("gpt-4.1", "GPT-4.1", 32_768),
            ModelInfo::new("o3", "o3", 100_000),
            ModelInfo::new("o4-mini", "o4-mini", 100_000),
        ],
    };

    OpenAiCompatProvider::new(config)
}
