//! GenAI Provider Access and Intent Classification
//!
//! This module wraps the external generative-AI providers the intent node can
//! be configured with, and the [`classifier::IntentClassifier`] adapter the
//! engine calls. Credentials are always supplied per call (bring your own key):
//! each business stores its own provider key on its GenAI node.

pub mod classifier;
pub mod providers;
pub mod traits;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Model identifiers accepted at save time and at call time
pub const SUPPORTED_MODELS: [&str; 7] = [
    "sonar-pro",
    "sonar",
    "sonar-pro-online",
    "sonar-pro-chat",
    "gemini-pro",
    "gemini-1.5-pro",
    "gemini-1.5-flash",
];

/// Check a model against the allow-list
pub fn is_supported_model(model: &str) -> bool {
    SUPPORTED_MODELS.contains(&model)
}

/// Provider hosting an allow-listed model
pub fn provider_for_model(model: &str) -> Option<LLMProviderType> {
    if !is_supported_model(model) {
        return None;
    }
    if model.starts_with("gemini-") {
        Some(LLMProviderType::Google)
    } else {
        Some(LLMProviderType::Perplexity)
    }
}

/// LLM Provider types supported by Blitz
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LLMProviderType {
    Google,
    Perplexity,
}

impl std::fmt::Display for LLMProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProviderType::Google => write!(f, "google"),
            LLMProviderType::Perplexity => write!(f, "perplexity"),
        }
    }
}

/// LLM Request structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRequest {
    pub id: Uuid,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl LLMRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            metadata: HashMap::new(),
        }
    }
}

/// Chat message structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// LLM Response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub id: String,
    pub model: String,
    pub content: String,
    pub finish_reason: Option<String>,
    pub usage: TokenUsage,
    pub provider: LLMProviderType,
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Error types for LLM operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum LLMError {
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Rate limit exceeded for provider: {0}")]
    RateLimitExceeded(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LLMError {
    /// Map a reqwest send failure, keeping timeouts distinguishable
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LLMError::Timeout(err.to_string())
        } else {
            LLMError::Network(err.to_string())
        }
    }
}

/// Result type for LLM operations
pub type LLMResult<T> = Result<T, LLMError>;
