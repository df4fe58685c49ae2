//! Google provider-specific types and structures
//! This module contains the request/response types for Gemini `generateContent`

use crate::llm::{ChatMessage, MessageRole, TokenUsage};
use serde::{Deserialize, Serialize};

/// Google API request structure for content generation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleRequest {
    pub contents: Vec<GoogleContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GoogleGenerationConfig>,
}

/// Google content structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleContent {
    #[serde(default)]
    pub parts: Vec<GooglePart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Google content part
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GooglePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl GooglePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

/// Google generation configuration
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<u32>,
}

/// Google API response structure
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleResponse {
    #[serde(default)]
    pub candidates: Vec<GoogleCandidate>,
    #[serde(default)]
    pub usage_metadata: Option<GoogleUsageMetadata>,
}

/// Google response candidate
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCandidate {
    #[serde(default)]
    pub content: Option<GoogleContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Google usage metadata
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleUsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
}

/// Google error response
#[derive(Debug, Deserialize)]
pub struct GoogleError {
    pub error: GoogleErrorDetails,
}

/// Google error details
#[derive(Debug, Deserialize)]
pub struct GoogleErrorDetails {
    #[serde(default)]
    pub code: u32,
    pub message: String,
    #[serde(default)]
    pub status: String,
}

impl From<&ChatMessage> for GoogleContent {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            parts: vec![GooglePart::text(msg.content.clone())],
            role: Some(match msg.role {
                // Gemini has no system role in `contents`
                MessageRole::System | MessageRole::User => "user".to_string(),
                MessageRole::Assistant => "model".to_string(),
            }),
        }
    }
}

impl From<GoogleUsageMetadata> for TokenUsage {
    fn from(usage: GoogleUsageMetadata) -> Self {
        Self {
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
        }
    }
}

impl GoogleResponse {
    /// Concatenated text of the first candidate, if any
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Get finish reason from first candidate
    pub fn finish_reason(&self) -> Option<String> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.finish_reason.clone())
    }
}

/// Helper function to convert conversation history for Google
///
/// System messages are folded into a leading user turn.
pub fn convert_conversation_history(messages: &[ChatMessage]) -> Vec<GoogleContent> {
    let mut contents = Vec::new();
    let mut system_messages = Vec::new();

    for msg in messages {
        match msg.role {
            MessageRole::System => system_messages.push(msg.content.clone()),
            _ => contents.push(GoogleContent::from(msg)),
        }
    }

    if !system_messages.is_empty() {
        let system_content = GoogleContent {
            parts: vec![GooglePart::text(format!(
                "System instructions: {}",
                system_messages.join("\n")
            ))],
            role: Some("user".to_string()),
        };
        contents.insert(0, system_content);
    }

    contents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_messages_lead_the_conversation() {
        let messages = vec![
            ChatMessage::new(MessageRole::User, "where is my order"),
            ChatMessage::new(MessageRole::System, "classify intents"),
            ChatMessage::new(MessageRole::Assistant, "which order?"),
        ];

        let contents = convert_conversation_history(&messages);
        assert_eq!(contents.len(), 3);
        assert_eq!(
            contents[0].parts[0].text.as_deref(),
            Some("System instructions: classify intents")
        );
        assert_eq!(contents[2].role.as_deref(), Some("model"));
    }

    #[test]
    fn test_response_text_joins_parts() {
        let raw = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "{\"intent\":"}, {"text": "\"order_query\"}"}], "role": "model"},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15}
        }"#;
        let response: GoogleResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.text().as_deref(), Some("{\"intent\":\"order_query\"}"));
        assert_eq!(response.finish_reason().as_deref(), Some("STOP"));
    }
}
