//! Built-in provider adapters.

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod openai_compat;
pub mod openrouter;
pub mod perplexity;
pub mod xai;

pub use anthropic::AnthropicProvider;
pub use ollama::new_ollama_provider;
pub use openai::new_openai_provider;
pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
pub use openrouter::new_openrouter_provider;
pub use perplexity::new_perplexity_provider;
pub use xai::new_xai_provider;
