//! Google provider client implementation
//! This module contains the client that makes requests to Google's Gemini API

use async_trait::async_trait;
use reqwest::{header::HeaderMap, header::HeaderValue, header::CONTENT_TYPE, Client};
use std::time::Duration;
use tracing::{debug, error};

use crate::llm::traits::{LLMProviderClient, ModelInfo};
use crate::llm::{LLMError, LLMProviderType, LLMRequest, LLMResponse, LLMResult, TokenUsage};

use super::config::{get_available_models, GoogleConfig};
use super::types::{convert_conversation_history, GoogleError, GoogleGenerationConfig, GoogleRequest, GoogleResponse};

/// Google provider client
pub struct GoogleClient {
    client: Client,
    config: GoogleConfig,
}

impl GoogleClient {
    /// Create a new Google client with configuration
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    /// Convert our internal request format to Google's format
    fn convert_request(&self, request: &LLMRequest) -> GoogleRequest {
        GoogleRequest {
            contents: convert_conversation_history(&request.messages),
            generation_config: Some(GoogleGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                candidate_count: Some(1),
            }),
        }
    }

    /// Convert Google response to our internal format
    fn convert_response(&self, response: GoogleResponse, model: &str) -> LLMResult<LLMResponse> {
        let content = response
            .text()
            .ok_or_else(|| LLMError::Internal("Google returned no candidates".to_string()))?;
        let finish_reason = response.finish_reason();
        let usage = response
            .usage_metadata
            .map(TokenUsage::from)
            .unwrap_or_default();

        Ok(LLMResponse {
            id: format!("google-{}", uuid::Uuid::new_v4()),
            model: model.to_string(),
            content,
            finish_reason,
            usage,
            provider: LLMProviderType::Google,
        })
    }

    /// Handle error responses from Google
    fn handle_error_response(&self, status_code: u16, error_text: &str) -> LLMError {
        let message = serde_json::from_str::<GoogleError>(error_text)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| error_text.to_string());

        match status_code {
            401 | 403 => LLMError::AuthenticationFailed(message),
            429 => LLMError::RateLimitExceeded(message),
            400 => LLMError::InvalidRequest(message),
            _ => LLMError::Internal(format!("Google API error ({}): {}", status_code, message)),
        }
    }

    /// Build request URL for Google API
    fn build_request_url(&self, model: &str, api_key: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            model,
            api_key
        )
    }
}

#[async_trait]
impl LLMProviderClient for GoogleClient {
    async fn chat_completion(&self, request: &LLMRequest, api_key: &str) -> LLMResult<LLMResponse> {
        let google_request = self.convert_request(request);
        let request_url = self.build_request_url(&request.model, api_key);

        debug!(model = %request.model, "Google API request");

        let response = self
            .client
            .post(&request_url)
            .headers(self.build_headers())
            .json(&google_request)
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .send()
            .await
            .map_err(LLMError::from_reqwest)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            error!("Google API Error: {}", status);
            return Err(self.handle_error_response(status.as_u16(), &error_text));
        }

        let response_text = response.text().await.map_err(LLMError::from_reqwest)?;

        let google_response: GoogleResponse = serde_json::from_str(&response_text).map_err(|e| {
            error!("Google Response Deserialization Error: {}", e);
            LLMError::Serialization(format!("Failed to parse Google response: {}", e))
        })?;

        debug!("Parsed Google Response: {} candidates", google_response.candidates.len());

        self.convert_response(google_response, &request.model)
    }

    fn provider_type(&self) -> LLMProviderType {
        LLMProviderType::Google
    }

    fn get_available_models(&self) -> Vec<ModelInfo> {
        get_available_models()
    }
}
