//! xAI (Grok) adapter built on the OpenAI-compatible transport.

use crate::providers::openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
use crate::types::ModelInfo;

const XAI_BASE_URL: &str = "https://api.x.ai/v1";

/// Create the xAI adapter.
///
/// Reads its credential from `XAI_API_KEY`.
pub fn new_xai_provider() -> OpenAiCompatProvider {
    let config = OpenAiCompatConfig {
        provider_name: "xai".to_string(),
        base_url: XAI_BASE_URL.to_string(),
        api_key_env: "XAI_API_KEY".to_string(),
        requires_api_key: true,
        models: vec![
            ModelInfo::new("grok-3", "Grok 3", 131_072),
            ModelInfo::new("grok-3-mini", "Grok 3 Mini", 131_072),
        ],
    };

    OpenAiCompatProvider::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ProviderAdapter;

    #[test]
    fn test_xai_provider() {
        let p = new_xai_provider();
        assert_eq!(p.name(), "xai");
        assert_eq!(p.models().len(), 2);
    }
}
