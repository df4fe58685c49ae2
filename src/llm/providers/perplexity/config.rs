//! Perplexity provider configuration

use serde::{Deserialize, Serialize};

use crate::llm::{traits::ModelInfo, LLMProviderType};

/// Perplexity-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerplexityConfig {
    /// Base URL for API requests
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for PerplexityConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.perplexity.ai".to_string(),
            timeout_seconds: 30,
        }
    }
}

fn sonar(id: &str, name: &str, context_window: u32) -> ModelInfo {
    ModelInfo {
        id: id.to_string(),
        name: name.to_string(),
        provider: LLMProviderType::Perplexity,
        context_window,
        max_output_tokens: 8192,
    }
}

/// Sonar models on the Blitz allow-list
pub fn get_available_models() -> Vec<ModelInfo> {
    vec![
        sonar("sonar-pro", "Sonar Pro", 200_000),
        sonar("sonar", "Sonar", 127_072),
        sonar("sonar-pro-online", "Sonar Pro Online", 200_000),
        sonar("sonar-pro-chat", "Sonar Pro Chat", 200_000),
    ]
}
