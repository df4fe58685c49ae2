//! Perplexity request/response types (OpenAI wire format)

use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, MessageRole, TokenUsage};

/// Chat completions request body
#[derive(Debug, Clone, Serialize)]
pub struct PerplexityRequest {
    pub model: String,
    pub messages: Vec<PerplexityChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Chat message format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerplexityChatMessage {
    pub role: String,
    pub content: String,
}

impl From<&ChatMessage> for PerplexityChatMessage {
    fn from(msg: &ChatMessage) -> Self {
        let role = match msg.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        Self {
            role: role.to_string(),
            content: msg.content.clone(),
        }
    }
}

/// Chat completions response body
#[derive(Debug, Deserialize)]
pub struct PerplexityResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<PerplexityChoice>,
    #[serde(default)]
    pub usage: Option<PerplexityUsage>,
}

#[derive(Debug, Deserialize)]
pub struct PerplexityChoice {
    pub message: PerplexityChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PerplexityUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl From<PerplexityUsage> for TokenUsage {
    fn from(usage: PerplexityUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

/// Error envelope
#[derive(Debug, Deserialize)]
pub struct PerplexityError {
    pub error: PerplexityErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct PerplexityErrorDetails {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}
