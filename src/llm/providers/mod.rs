//! LLM Providers Module
//!
//! This module contains implementations for the GenAI providers a Blitz intent
//! node can be configured with, organized by provider with each having its own
//! subdirectory containing:
//! - client.rs: Provider-specific client implementation
//! - config.rs: Provider-specific configuration and model definitions
//! - types.rs: Provider-specific request/response types
//! - mod.rs: Module exports

pub mod google;
pub mod perplexity;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ProvidersConfig;
use crate::llm::{provider_for_model, traits::LLMProviderClient, LLMProviderType};

// Re-export provider clients for convenience
pub use google::GoogleClient;
pub use perplexity::PerplexityClient;

/// Registry of provider clients keyed by provider type
///
/// Clients are shared behind `Arc` so one registry can back every concurrent run.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: HashMap<LLMProviderType, Arc<dyn LLMProviderClient>>,
}

impl ProviderRegistry {
    /// Create an empty provider registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the Google and Perplexity clients built from configuration
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let mut google = google::GoogleConfig::default();
        google.base_url = config.google_base_url.clone();
        google.timeout_seconds = config.timeout_seconds;

        let mut perplexity = perplexity::PerplexityConfig::default();
        perplexity.base_url = config.perplexity_base_url.clone();
        perplexity.timeout_seconds = config.timeout_seconds;

        Self::new()
            .with_client(Arc::new(GoogleClient::new(google)))
            .with_client(Arc::new(PerplexityClient::new(perplexity)))
    }

    /// Register (or replace) the client for its provider type
    pub fn with_client(mut self, client: Arc<dyn LLMProviderClient>) -> Self {
        self.clients.insert(client.provider_type(), client);
        self
    }

    /// Get a provider client
    pub fn get_provider(&self, provider_type: &LLMProviderType) -> Option<Arc<dyn LLMProviderClient>> {
        self.clients.get(provider_type).cloned()
    }

    /// Client serving an allow-listed model
    pub fn client_for_model(&self, model: &str) -> Option<Arc<dyn LLMProviderClient>> {
        provider_for_model(model).and_then(|provider| self.get_provider(&provider))
    }
}
