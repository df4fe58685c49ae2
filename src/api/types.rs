// Request and response bodies of the Blitz HTTP API
// Chat bodies live with the chat service; these are the diagnostic and builder ones

use serde::{Deserialize, Serialize};

use crate::models::GenAIConfig;

/// Query of `GET /api/blitz/test-genai`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestGenAIQuery {
    pub business_id: Option<String>,
}

/// Body of `POST /api/blitz/test-api`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestApiRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default, alias = "apiKey")]
    pub api_key: String,
}

impl TestApiRequest {
    pub fn into_config(self) -> GenAIConfig {
        GenAIConfig::new(self.model.trim(), self.api_key.trim())
    }
}

/// Plain `{error}` body for non-chat endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

/// `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: i64,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            service: "blitz-workflow".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_request_accepts_camel_case_key() {
        let request: TestApiRequest = serde_json::from_str(r#"{"model": " sonar ", "apiKey": " pplx-1 "}"#).unwrap();
        let config = request.into_config();
        assert_eq!(config.model, "sonar");
        assert_eq!(config.api_key, "pplx-1");
        assert!(!config.api_key_validated);
    }

    #[test]
    fn test_genai_query_business_id() {
        let query: TestGenAIQuery = serde_json::from_str(r#"{"businessId": "biz-1"}"#).unwrap();
        assert_eq!(query.business_id.as_deref(), Some("biz-1"));
    }
}
