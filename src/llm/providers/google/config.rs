//! Google provider configuration
//! This module contains configuration structures and defaults specific to Google Gemini

use serde::{Deserialize, Serialize};

use crate::llm::{traits::ModelInfo, LLMProviderType};

/// Google-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// Base URL for API requests
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Gemini models on the Blitz allow-list
pub fn get_available_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            id: "gemini-pro".to_string(),
            name: "Gemini Pro".to_string(),
            provider: LLMProviderType::Google,
            context_window: 32768,
            max_output_tokens: 8192,
        },
        ModelInfo {
            id: "gemini-1.5-pro".to_string(),
            name: "Gemini 1.5 Pro".to_string(),
            provider: LLMProviderType::Google,
            context_window: 2097152, // 2M tokens
            max_output_tokens: 8192,
        },
        ModelInfo {
            id: "gemini-1.5-flash".to_string(),
            name: "Gemini 1.5 Flash".to_string(),
            provider: LLMProviderType::Google,
            context_window: 1048576, // 1M tokens
            max_output_tokens: 8192,
        },
    ]
}
