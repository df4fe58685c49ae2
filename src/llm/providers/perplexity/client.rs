//! Perplexity provider client implementation

use async_trait::async_trait;
use reqwest::{header::HeaderMap, header::HeaderValue, header::AUTHORIZATION, header::CONTENT_TYPE, Client};
use std::time::Duration;
use tracing::{debug, error};

use crate::llm::traits::{LLMProviderClient, ModelInfo};
use crate::llm::{LLMError, LLMProviderType, LLMRequest, LLMResponse, LLMResult};

use super::config::{get_available_models, PerplexityConfig};
use super::types::{PerplexityError, PerplexityRequest, PerplexityResponse};

/// Perplexity provider client
pub struct PerplexityClient {
    client: Client,
    config: PerplexityConfig,
}

impl PerplexityClient {
    pub fn new(config: PerplexityConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Build HTTP headers for requests
    fn build_headers(&self, api_key: &str) -> LLMResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| LLMError::InvalidRequest(format!("Invalid API key: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn convert_request(&self, request: &LLMRequest) -> PerplexityRequest {
        PerplexityRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(Into::into).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    fn convert_response(&self, response: PerplexityResponse, model: &str) -> LLMResult<LLMResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::Internal("Perplexity returned no choices".to_string()))?;

        Ok(LLMResponse {
            id: if response.id.is_empty() {
                format!("perplexity-{}", uuid::Uuid::new_v4())
            } else {
                response.id
            },
            model: if response.model.is_empty() {
                model.to_string()
            } else {
                response.model
            },
            content: choice.message.content,
            finish_reason: choice.finish_reason,
            usage: response.usage.map(Into::into).unwrap_or_default(),
            provider: LLMProviderType::Perplexity,
        })
    }

    fn handle_error_response(&self, status_code: u16, error_text: &str) -> LLMError {
        let message = serde_json::from_str::<PerplexityError>(error_text)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| error_text.to_string());

        match status_code {
            401 | 403 => LLMError::AuthenticationFailed(message),
            429 => LLMError::RateLimitExceeded(message),
            400 => LLMError::InvalidRequest(message),
            _ => LLMError::Internal(format!("Perplexity API error ({}): {}", status_code, message)),
        }
    }

    fn build_request_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LLMProviderClient for PerplexityClient {
    async fn chat_completion(&self, request: &LLMRequest, api_key: &str) -> LLMResult<LLMResponse> {
        let headers = self.build_headers(api_key)?;
        let body = self.convert_request(request);

        debug!(model = %request.model, "Perplexity API request");

        let response = self
            .client
            .post(self.build_request_url())
            .headers(headers)
            .json(&body)
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

            error!("Perplexity API Error: {}", status);
            return Err(self.handle_error_response(status.as_u16(), &error_text));
        }

        let parsed: PerplexityResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Serialization(format!("Failed to parse Perplexity response: {}", e)))?;

        self.convert_response(parsed, &request.model)
    }

    fn provider_type(&self) -> LLMProviderType {
        LLMProviderType::Perplexity
    }

    fn get_available_models(&self) -> Vec<ModelInfo> {
        get_available_models()
    }
}
