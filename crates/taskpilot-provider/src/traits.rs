//! Provider adapter trait definition.

use crate::error::ProviderError;
use crate::stream::TextStream;
use crate::types::{ModelInfo, ObjectResult, ProviderRequest, ServiceType, TextResult};
use async_trait::async_trait;

/// Trait for LLM provider adapters.
///
/// Adapters translate a provider-neutral [`ProviderRequest`] into one
/// backend's API and normalize the answer. They hold no per-call state:
/// credential, model and endpoint all travel in the request, so one adapter
/// instance serves every project and role concurrently.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name used in configuration (e.g., "anthropic", "openai").
    fn name(&self) -> &str;

    /// Known models. Unknown model ids are still passed through.
    fn models(&self) -> Vec<ModelInfo>;

    /// Environment variable holding this provider's credential.
    fn api_key_env_var(&self) -> &str;

    /// Whether calls need a credential at all.
    fn requires_api_key(&self) -> bool {
        true
    }

    /// Whether this adapter implements `service`.
    fn supports(&self, service: ServiceType) -> bool {
        let _ = service;
        true
    }

    /// Look up a known model by id.
    fn model_info(&self, model_id: &str) -> Option<ModelInfo> {
        self.models().into_iter().find(|m| m.id == model_id)
    }

    /// Generate a complete text response.
    async fn generate_text(&self, request: ProviderRequest) -> Result<TextResult, ProviderError>;

    /// Start a streaming text response.
    async fn stream_text(&self, request: ProviderRequest) -> Result<TextStream, ProviderError>;

    /// Generate an object matching `request.object`.
    ///
    /// Fails with [`ProviderError::UnsupportedCapability`] when the model
    /// cannot do tool calling.
    async fn generate_object(&self, request: ProviderRequest)
        -> Result<ObjectResult, ProviderError>;
}

// Compile-time check: ProviderAdapter must be object-safe
const _: () = {
    fn _assert_object_safe(_: &dyn ProviderAdapter) {}
};
