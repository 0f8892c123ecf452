//! Registry of provider adapters, keyed by configuration name.

use crate::providers::{
    new_ollama_provider, new_openai_provider, new_openrouter_provider, new_perplexity_provider,
    new_xai_provider, AnthropicProvider,
};
use crate::traits::ProviderAdapter;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available adapters.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Clone)]
pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry with every built-in adapter.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AnthropicProvider::new()));
        registry.register(Arc::new(new_openai_provider()));
        registry.register(Arc::new(new_openrouter_provider()));
        registry.register(Arc::new(new_perplexity_provider()));
        registry.register(Arc::new(new_xai_provider()));
        registry.register(Arc::new(new_ollama_provider()));
        registry
    }

    /// Register an adapter. Replaces any existing adapter with the same name.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters
            .insert(adapter.name().to_lowercase(), adapter);
    }

    /// Get an adapter by provider name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&name.to_lowercase()).cloned()
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
