//! taskpilot-provider: LLM provider adapter contract and implementations.

mod error;
pub mod providers;
pub mod registry;
pub mod schema;
mod sse;
pub mod stream;
pub mod traits;
pub mod types;

pub use error::{mentions_unsupported_tools, ProviderError};
pub use providers::{
    new_ollama_provider, new_openai_provider, new_openrouter_provider, new_perplexity_provider,
    new_xai_provider, AnthropicProvider, OpenAiCompatConfig, OpenAiCompatProvider,
};
pub use registry::ProviderRegistry;
pub use schema::{sanitize_schema, validate_object};
pub use stream::{CompletionHook, TextStream};
pub use traits::ProviderAdapter;
pub use types::{
    Message, MessageRole, ModelInfo, ObjectResult, ObjectSpec, ProviderRequest, ServiceType,
    StopReason, StreamEvent, TextResult, Usage,
};
