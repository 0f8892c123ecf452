//! Perplexity adapter, usually assigned to the research role.

use crate::providers::openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
use crate::types::ModelInfo;

const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";

/// Create the Perplexity adapter.
///
/// Sonar models answer with web-grounded text and cannot be forced into tool
/// calls. Reads its credential from `PERPLEXITY_API_KEY`.
pub fn new_perplexity_provider() -> OpenAiCompatProvider {
    let config = OpenAiCompatConfig {
        provider_name: "perplexity".to_string(),
        base_url: PERPLEXITY_BASE_URL.to_string(),
        api_key_env: "PERPLEXITY_API_KEY".to_string(),
        requires_api_key: true,
        models: vec![
            ModelInfo::new("sonar-pro", "Sonar Pro", 8_700).text_only(),
            ModelInfo::new("sonar", "Sonar", 8_700).text_only(),
            ModelInfo::new("sonar-reasoning-pro", "Sonar Reasoning Pro", 8_700).text_only(),
            ModelInfo::new("sonar-deep-research", "Sonar Deep Research", 8_700).text_only(),
        ],
    };

    OpenAiCompatProvider::new(config)
}
