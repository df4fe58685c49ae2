//! Google provider module
//! This module provides the Google Gemini implementation used by intent nodes

pub mod client;
pub mod config;
pub mod types;

pub use client::GoogleClient;
pub use config::{get_available_models, GoogleConfig};
pub use types::{
    convert_conversation_history, GoogleContent, GoogleError, GoogleGenerationConfig, GooglePart,
    GoogleRequest, GoogleResponse,
};

/// Create a new Google client with a base URL override
pub fn create_client(base_url: Option<String>) -> GoogleClient {
    let mut config = GoogleConfig::default();
    if let Some(url) = base_url {
        config.base_url = url;
    }
    GoogleClient::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::traits::LLMProviderClient;
    use crate::llm::LLMProviderType;

    #[test]
    fn test_create_client() {
        let client = create_client(None);
        assert_eq!(client.provider_type(), LLMProviderType::Google);
    }

    #[test]
    fn test_available_models_are_allow_listed() {
        let models = get_available_models();
        assert_eq!(models.len(), 3);
        for model in models {
            assert!(crate::llm::is_supported_model(&model.id), "{}", model.id);
        }
    }
}
