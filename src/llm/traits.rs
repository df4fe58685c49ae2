//! Common traits and types for LLM providers
//! This module defines the interface every GenAI provider client implements

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{LLMProviderType, LLMRequest, LLMResponse, LLMResult};

/// Core trait that all LLM provider clients must implement
///
/// The API key is passed per call because every business brings its own.
#[async_trait]
pub trait LLMProviderClient: Send + Sync {
    /// Send a chat completion request
    async fn chat_completion(&self, request: &LLMRequest, api_key: &str) -> LLMResult<LLMResponse>;

    /// Get the provider type
    fn provider_type(&self) -> LLMProviderType;

    /// Get available models for this provider
    fn get_available_models(&self) -> Vec<ModelInfo>;

    /// Validate if a model is supported by this provider
    fn supports_model(&self, model: &str) -> bool {
        self.get_available_models().iter().any(|m| m.id == model)
    }
}

/// Model information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier
    pub id: String,
    /// Human-readable model name
    pub name: String,
    /// Provider that hosts this model
    pub provider: LLMProviderType,
    /// Maximum context window size
    pub context_window: u32,
    /// Maximum output tokens
    pub max_output_tokens: u32,
}
