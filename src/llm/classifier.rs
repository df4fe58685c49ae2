//! Intent Classifier Adapter
//!
//! Wraps one call to the GenAI provider configured on a `genai-intent` node and
//! turns the reply into a detected [`Intent`] plus an optional free-text answer
//! and structured data.
//!
//! Configuration is validated before anything leaves the process: a blank model
//! or key, or a model outside the allow-list, fails immediately without a
//! network call. Transport failures and timeouts are reported as provider
//! errors and never retried here; chat is interactive and the caller decides.
//!
//! ## Rust Learning Notes:
//!
//! ### `tokio::time::timeout`
//! The provider client has its own HTTP timeout, but the classifier also wraps
//! the whole future so a slow provider can never hold a chat turn longer than
//! the configured budget.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::providers::ProviderRegistry;
use super::{is_supported_model, ChatMessage, LLMError, LLMRequest, MessageRole, SUPPORTED_MODELS};
use crate::models::{ChatRole, CommunicationMethod, ConversationTurn, ExecutionErrorKind, GenAIConfig, Intent};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const CLASSIFIER_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Errors raised by the classifier adapter
#[derive(Error, Debug, Clone)]
pub enum ClassifierError {
    #[error("GenAI {field} is missing")]
    Configuration { field: &'static str },

    #[error("Unsupported model '{model}'. Supported models: {}", supported.join(", "))]
    UnsupportedModel { model: String, supported: Vec<String> },

    #[error("GenAI provider error: {0}")]
    Provider(#[from] LLMError),

    #[error("Message must not be empty")]
    InvalidMessage,
}

impl ClassifierError {
    pub fn kind(&self) -> ExecutionErrorKind {
        match self {
            ClassifierError::Configuration { .. } | ClassifierError::InvalidMessage => {
                ExecutionErrorKind::Configuration
            }
            ClassifierError::UnsupportedModel { .. } => ExecutionErrorKind::UnsupportedModel,
            ClassifierError::Provider(_) => ExecutionErrorKind::Provider,
        }
    }
}

/// Outcome of one classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub intent: Intent,
    /// Provider text exactly as received
    pub raw_response: String,
    /// Free-text answer the model offered, used by FAQ modules
    pub reply: Option<String>,
    /// Structured fields the model extracted (order id, reason, ...)
    pub data: Option<Value>,
    pub method: CommunicationMethod,
}

/// Result of a test-mode call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigTestResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConfigTestResult {
    pub fn valid() -> Self {
        Self { valid: true, error: None }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Adapter from a GenAI node configuration to a provider call
#[derive(Clone)]
pub struct IntentClassifier {
    providers: ProviderRegistry,
    timeout: Duration,
}

impl IntentClassifier {
    pub fn new(providers: ProviderRegistry) -> Self {
        Self {
            providers,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fail-fast checks that never touch the network
    pub fn validate_config(config: &GenAIConfig) -> Result<(), ClassifierError> {
        if config.model.trim().is_empty() {
            return Err(ClassifierError::Configuration { field: "model" });
        }
        if config.api_key.trim().is_empty() {
            return Err(ClassifierError::Configuration { field: "API key" });
        }
        if !is_supported_model(config.model.trim()) {
            return Err(ClassifierError::UnsupportedModel {
                model: config.model.clone(),
                supported: SUPPORTED_MODELS.iter().map(|m| m.to_string()).collect(),
            });
        }
        Ok(())
    }

    /// Classify `message` given the prior `history`
    ///
    /// `history` must not already contain `message`.
    pub async fn classify(
        &self,
        history: &[ConversationTurn],
        message: &str,
        config: &GenAIConfig,
    ) -> Result<Classification, ClassifierError> {
        Self::validate_config(config)?;
        if message.trim().is_empty() {
            return Err(ClassifierError::InvalidMessage);
        }

        let request = build_request(config, history, message);
        let raw_response = self.send(config, &request).await?;
        let (intent, reply, data) = parse_classification(&raw_response);

        debug!(
            model = %config.model,
            intent = %intent,
            history_len = history.len(),
            "Message classified"
        );

        Ok(Classification {
            intent,
            raw_response,
            reply,
            data,
            method: CommunicationMethod::GenAIToFrontend,
        })
    }

    /// Confirm a credential/model pair answers, without touching any session state
    pub async fn test_configuration(&self, config: &GenAIConfig, sample_message: &str) -> ConfigTestResult {
        if let Err(err) = Self::validate_config(config) {
            return ConfigTestResult::invalid(err.to_string());
        }
        let sample = if sample_message.trim().is_empty() {
            "Hello"
        } else {
            sample_message
        };

        let request = build_request(config, &[], sample);
        match self.send(config, &request).await {
            Ok(_) => ConfigTestResult::valid(),
            Err(err) => {
                warn!(model = %config.model, api_key = %config.masked_api_key(), "GenAI test call failed: {}", err);
                ConfigTestResult::invalid(err.to_string())
            }
        }
    }

    async fn send(&self, config: &GenAIConfig, request: &LLMRequest) -> Result<String, ClassifierError> {
        let client = self
            .providers
            .client_for_model(&request.model)
            .ok_or_else(|| LLMError::ProviderNotFound(request.model.clone()))?;

        let response = tokio::time::timeout(self.timeout, client.chat_completion(request, config.api_key.trim()))
            .await
            .map_err(|_| {
                LLMError::Timeout(format!("no reply from {} within {:?}", client.provider_type(), self.timeout))
            })??;

        Ok(response.content)
    }
}

fn system_prompt(config: &GenAIConfig) -> String {
    let intents = Intent::ALL
        .iter()
        .map(|intent| format!("- {}: {}", intent.as_str(), intent.description()))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        "You are a customer support assistant for an online store. \
         Classify the customer's latest message into exactly one intent:\n{}\n\n\
         Reply with a single JSON object and nothing else:\n\
         {{\"intent\": \"<intent>\", \"response\": \"<short answer for the customer>\", \
         \"data\": {{\"order_id\": \"<order id if mentioned>\"}}}}",
        intents
    );
    if let Some(instructions) = config.instructions.as_deref().filter(|i| !i.trim().is_empty()) {
        prompt.push_str("\n\nStore instructions:\n");
        prompt.push_str(instructions.trim());
    }
    prompt
}

fn build_request(config: &GenAIConfig, history: &[ConversationTurn], message: &str) -> LLMRequest {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::new(MessageRole::System, system_prompt(config)));
    messages.extend(history.iter().map(|turn| {
        let role = match turn.role {
            ChatRole::User => MessageRole::User,
            ChatRole::Assistant => MessageRole::Assistant,
        };
        ChatMessage::new(role, turn.content.clone())
    }));
    messages.push(ChatMessage::new(MessageRole::User, message));

    let mut request = LLMRequest::new(config.model.trim(), messages);
    request.temperature = Some(config.temperature.unwrap_or(DEFAULT_TEMPERATURE));
    request.max_tokens = Some(CLASSIFIER_MAX_TOKENS);
    request
}

/// Extract `(intent, reply, data)` from provider text
///
/// Tolerates code fences and prose around the JSON object. Anything that does
/// not parse maps to `general_query` with the raw text as the reply.
pub fn parse_classification(raw: &str) -> (Intent, Option<String>, Option<Value>) {
    let trimmed = raw.trim();

    let object = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<Value>(&trimmed[start..=end])
                .ok()
                .filter(Value::is_object)
        }
        _ => None,
    };

    let Some(object) = object else {
        let reply = Some(trimmed.to_string()).filter(|r| !r.is_empty());
        return (Intent::GeneralQuery, reply, None);
    };

    let intent = object
        .get("intent")
        .and_then(Value::as_str)
        .map(Intent::from_provider_label)
        .unwrap_or(Intent::GeneralQuery);
    let reply = object
        .get("response")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);
    let data = object
        .get("data")
        .filter(|d| d.as_object().map(|o| !o.is_empty()).unwrap_or(false))
        .cloned();

    (intent, reply, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::StubProvider;
    use crate::llm::LLMProviderType;
    use std::sync::Arc;

    fn classifier_with(stub: Arc<StubProvider>) -> IntentClassifier {
        IntentClassifier::new(ProviderRegistry::new().with_client(stub))
    }

    #[tokio::test]
    async fn test_blank_key_fails_without_network_call() {
        let stub = StubProvider::replying(LLMProviderType::Google, r#"{"intent":"order_query"}"#);
        let classifier = classifier_with(stub.clone());

        let err = classifier
            .classify(&[], "where is my order", &GenAIConfig::new("gemini-pro", "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifierError::Configuration { field: "API key" }));

        let err = classifier
            .classify(&[], "where is my order", &GenAIConfig::new("", "key"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ExecutionErrorKind::Configuration);
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_model_is_rejected_before_calling_out() {
        let stub = StubProvider::replying(LLMProviderType::Perplexity, "{}");
        let classifier = classifier_with(stub.clone());

        let result = classifier
            .test_configuration(&GenAIConfig::new("gpt-5-unreleased", "x"), "hi")
            .await;
        assert!(!result.valid);
        let error = result.error.unwrap();
        assert!(error.contains("gpt-5-unreleased"));
        assert!(error.contains("sonar-pro"));
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_classify_sends_history_then_message() {
        let stub = StubProvider::replying(
            LLMProviderType::Google,
            "```json\n{\"intent\": \"order_query\", \"response\": \"Let me check\", \"data\": {\"order_id\": \"1234\"}}\n```",
        );
        let classifier = classifier_with(stub.clone());
        let history = vec![ConversationTurn::user("hi"), ConversationTurn::assistant("hello!")];

        let classification = classifier
            .classify(&history, "Where is my order #1234?", &GenAIConfig::new("gemini-pro", "key"))
            .await
            .unwrap();

        assert_eq!(classification.intent, Intent::OrderQuery);
        assert_eq!(classification.reply.as_deref(), Some("Let me check"));
        assert_eq!(classification.data.unwrap()["order_id"], "1234");
        assert_eq!(classification.method, CommunicationMethod::GenAIToFrontend);

        let request = stub.last_request().unwrap();
        // system prompt + 2 history turns + the new message
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0].role, MessageRole::System);
        assert_eq!(request.messages[3].content, "Where is my order #1234?");
        assert_eq!(stub.last_api_key().as_deref(), Some("key"));
    }

    #[tokio::test]
    async fn test_provider_failure_is_reported_not_retried() {
        let stub = StubProvider::failing(LLMProviderType::Perplexity, LLMError::Network("connection reset".into()));
        let classifier = classifier_with(stub.clone());

        let err = classifier
            .classify(&[], "hello", &GenAIConfig::new("sonar", "key"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ExecutionErrorKind::Provider);
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let stub = StubProvider::hanging(LLMProviderType::Google);
        let classifier = classifier_with(stub).with_timeout(Duration::from_millis(20));

        let err = classifier
            .classify(&[], "hello", &GenAIConfig::new("gemini-pro", "key"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifierError::Provider(LLMError::Timeout(_))));
    }

    #[test]
    fn test_unparsable_reply_falls_back_to_general_query() {
        let (intent, reply, data) = parse_classification("Sure! We are open 9 to 5.");
        assert_eq!(intent, Intent::GeneralQuery);
        assert_eq!(reply.as_deref(), Some("Sure! We are open 9 to 5."));
        assert!(data.is_none());

        let (intent, _, _) = parse_classification(r#"{"intent": "book_a_flight"}"#);
        assert_eq!(intent, Intent::GeneralQuery);
    }

    #[test]
    fn test_prose_around_json_is_tolerated() {
        let (intent, reply, data) =
            parse_classification("Here you go: {\"intent\": \"cancellation\", \"response\": \"\", \"data\": {}} thanks");
        assert_eq!(intent, Intent::Cancellation);
        assert!(reply.is_none());
        assert!(data.is_none());
    }

    #[test]
    fn test_store_instructions_reach_the_prompt() {
        let mut config = GenAIConfig::new("sonar", "key");
        config.instructions = Some("Always answer in French.".to_string());
        let prompt = system_prompt(&config);
        assert!(prompt.contains("refund_query"));
        assert!(prompt.ends_with("Always answer in French."));
    }
}
