// Chat turn orchestration
// One inbound message: identity → workflow → history → engine run → persistence

//! # Chat Service
//!
//! The produced interface of the engine. [`ChatService::handle_chat`] owns the
//! chat turn around one engine run:
//!
//! 1. Reject callers without an identity (401)
//! 2. Resolve the caller's business and its active workflow
//! 3. Load the graph with decrypted configuration
//! 4. Read the session history and run the engine
//! 5. Append the user message and the assistant reply to the session
//!
//! Failures never carry raw provider text in `error`; the technical detail
//! only appears in the `debug` block.
//!
//! ## Rust Learning Notes:
//!
//! ### Errors as Values with a Status
//! `ChatFailure` carries the HTTP status as a plain `u16` so this module stays
//! independent of the web framework; the API layer turns it into a response.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::executor::WorkflowExecutionEngine;
use super::resolver::ConfigResolver;
use super::storage::{ChatStorage, IdentityProvider, WorkflowStorage};
use crate::llm::classifier::IntentClassifier;
use crate::models::{
    BusinessAccount, ChatRole, CommunicationMethod, ConversationTurn, ExecutionContext, ExecutionError,
    ExecutionErrorKind, ExecutionResult, Identity, Intent, Workflow, WorkflowGraph,
};
use crate::BlitzError;

pub const API_KEY_MISSING: &str =
    "GenAI API key is missing. Add an API key to the GenAI intent node in the workflow builder.";
pub const MODEL_MISSING: &str = "GenAI model is missing. Select a model on the GenAI intent node in the workflow builder.";
pub const EXECUTION_FAILED: &str = "Workflow execution failed";

const DIAGNOSTIC_SAMPLE_MESSAGE: &str = "Hello, I have a question about my order.";

/// Body of `POST /api/blitz/chat`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    /// Defaults to the business owned by the caller
    #[serde(default)]
    pub business_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            business_id: None,
        }
    }
}

/// Trace of a chat turn, for the builder's debug panel
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<Uuid>,
    pub execution_path: Vec<String>,
    pub total_execution_time: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ExecutionError>,
    /// Technical detail behind a friendly error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DebugInfo {
    fn for_business(business_id: &str) -> Self {
        Self {
            business_id: Some(business_id.to_string()),
            ..Self::default()
        }
    }

    fn for_run(business_id: &str, result: &ExecutionResult) -> Self {
        Self {
            business_id: Some(business_id.to_string()),
            workflow_id: Some(result.workflow_id.clone()),
            execution_id: Some(result.execution_id),
            execution_path: result.execution_path.clone(),
            total_execution_time: result.total_execution_time,
            errors: result.errors.clone(),
            detail: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Successful chat turn (HTTP 200)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub method: CommunicationMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

/// JSON body of every chat error response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatErrorBody {
    pub error: String,
    pub method: CommunicationMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

/// Failed chat turn with the HTTP status it maps to
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{status}: {}", body.error)]
pub struct ChatFailure {
    pub status: u16,
    pub body: ChatErrorBody,
}

impl ChatFailure {
    fn new(status: u16, error: impl Into<String>, debug: Option<DebugInfo>) -> Self {
        Self {
            status,
            body: ChatErrorBody {
                error: error.into(),
                method: CommunicationMethod::FrontendToBlitz,
                debug,
            },
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(401, "Authentication required", None)
    }

    pub fn bad_request(error: impl Into<String>, debug: Option<DebugInfo>) -> Self {
        Self::new(400, error, debug)
    }

    pub fn internal(error: impl Into<String>, debug: Option<DebugInfo>) -> Self {
        Self::new(500, error, debug)
    }
}

/// Result of the read-only GenAI diagnostic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
    /// `"success"` or `"error"`
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DiagnosticReport {
    fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: Some(message.into()),
            error: None,
        }
    }

    fn error(error: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Friendly text for a failed run
///
/// A configuration failure on the entry node is narrowed down to the field the
/// user has to fill in.
fn friendly_message(graph: &WorkflowGraph, error: &ExecutionError) -> &'static str {
    if error.code != ExecutionErrorKind::Configuration {
        return EXECUTION_FAILED;
    }
    let genai = error
        .node_id
        .as_deref()
        .and_then(|id| graph.node(id))
        .and_then(|node| node.genai_config());
    match genai {
        Some(config) if config.model.trim().is_empty() => MODEL_MISSING,
        Some(config) if config.api_key.trim().is_empty() => API_KEY_MISSING,
        _ => EXECUTION_FAILED,
    }
}

/// Orchestrates chat turns over the engine and its collaborators
#[derive(Clone)]
pub struct ChatService {
    identity: Arc<dyn IdentityProvider>,
    chats: Arc<dyn ChatStorage>,
    workflows: Arc<dyn WorkflowStorage>,
    resolver: ConfigResolver,
    engine: WorkflowExecutionEngine,
}

impl ChatService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        chats: Arc<dyn ChatStorage>,
        workflows: Arc<dyn WorkflowStorage>,
        resolver: ConfigResolver,
        engine: WorkflowExecutionEngine,
    ) -> Self {
        Self {
            identity,
            chats,
            workflows,
            resolver,
            engine,
        }
    }

    pub fn classifier(&self) -> &IntentClassifier {
        self.engine.classifier()
    }

    /// The caller's user and business records (`ensureBusinessForUser`)
    pub async fn caller_account(&self, identity: &Identity) -> Result<BusinessAccount, BlitzError> {
        self.identity.ensure_business_for_user(identity).await
    }

    /// First active workflow of the business, newest first
    async fn active_workflow(&self, business_id: &str) -> Result<Option<Workflow>, BlitzError> {
        let workflows = self.workflows.list_workflows_for_business(business_id).await?;
        Ok(workflows.into_iter().find(|workflow| workflow.is_active))
    }

    async fn resolve_business(&self, identity: &Identity, requested: Option<&str>) -> Result<String, ChatFailure> {
        let account = self.identity.ensure_business_for_user(identity).await.map_err(|err| match err {
            BlitzError::Unauthorized(_) => ChatFailure::unauthorized(),
            other => {
                error!(user_id = %identity.user_id, "Account lookup failed: {}", other);
                ChatFailure::internal("Could not resolve the business for this user", None)
            }
        })?;

        Ok(requested
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or(account.business.id))
    }

    async fn load_graph(&self, business_id: &str) -> Result<WorkflowGraph, ChatFailure> {
        let debug = || DebugInfo::for_business(business_id);

        let workflow = self
            .active_workflow(business_id)
            .await
            .map_err(|err| ChatFailure::internal(EXECUTION_FAILED, Some(debug().with_detail(err.to_string()))))?
            .ok_or_else(|| {
                ChatFailure::bad_request(
                    "No active workflow found for this business. Create one in the workflow builder.",
                    Some(debug()),
                )
            })?;

        self.resolver
            .load_workflow_with_configurations(&workflow.id)
            .await
            .map_err(|err| {
                warn!(business_id, workflow_id = %workflow.id, "Workflow could not be loaded: {}", err);
                let mut info = debug().with_detail(err.to_string());
                info.workflow_id = Some(workflow.id.clone());
                ChatFailure::bad_request("Workflow configuration is invalid or incomplete", Some(info))
            })
    }

    /// Handle one chat message for the authenticated caller
    pub async fn handle_chat(
        &self,
        identity: Option<Identity>,
        request: ChatRequest,
    ) -> Result<ChatResponse, ChatFailure> {
        let identity = identity.ok_or_else(ChatFailure::unauthorized)?;
        let message = request.message.trim();
        if message.is_empty() {
            return Err(ChatFailure::bad_request("Message is required", None));
        }

        let business_id = self.resolve_business(&identity, request.business_id.as_deref()).await?;
        let graph = self.load_graph(&business_id).await?;

        let storage_failure = |err: BlitzError| {
            error!(business_id = %business_id, "Chat storage failed: {}", err);
            ChatFailure::internal(
                EXECUTION_FAILED,
                Some(DebugInfo::for_business(&business_id).with_detail(err.to_string())),
            )
        };

        let session = self
            .chats
            .get_or_create_chat_session(&identity.user_id, &business_id)
            .await
            .map_err(storage_failure)?;
        let history: Vec<ConversationTurn> = self
            .chats
            .get_chat_history(session.id)
            .await
            .map_err(storage_failure)?
            .into_iter()
            .map(|turn| ConversationTurn {
                role: turn.role,
                content: turn.content,
            })
            .collect();

        let context = ExecutionContext::new(
            &business_id,
            &identity.user_id,
            &graph.workflow_id,
            session.id,
            history,
            message,
        );
        let result = self.engine.execute(&graph, &context).await;

        self.chats
            .save_chat_message(session.id, ChatRole::User, message, result.intent, None)
            .await
            .map_err(storage_failure)?;

        let debug = DebugInfo::for_run(&business_id, &result);
        if !result.success {
            let Some(fatal) = result.fatal_error() else {
                return Err(ChatFailure::internal(EXECUTION_FAILED, Some(debug)));
            };
            let friendly = friendly_message(&graph, fatal);
            let debug = debug.with_detail(fatal.message.clone());
            return Err(if fatal.code.is_configuration_class() {
                ChatFailure::bad_request(friendly, Some(debug))
            } else {
                ChatFailure::internal(friendly, Some(debug))
            });
        }

        let Some(formatted) = self.engine.format_response(&result) else {
            return Err(ChatFailure::internal(EXECUTION_FAILED, Some(debug)));
        };

        self.chats
            .save_chat_message(
                session.id,
                ChatRole::Assistant,
                &formatted.response,
                result.intent,
                result.extracted_data.clone(),
            )
            .await
            .map_err(storage_failure)?;

        info!(
            business_id = %business_id,
            execution_id = %result.execution_id,
            method = %formatted.method.as_str(),
            "Chat turn answered"
        );

        Ok(ChatResponse {
            method: formatted.method,
            intent: result.intent,
            response: Some(formatted.response),
            data: formatted.data.or(result.extracted_data),
            debug: Some(debug),
        })
    }

    /// Check that the business's workflow has a usable GenAI node (`testGenAI`)
    ///
    /// Performs one provider test call; never touches chat sessions.
    pub async fn diagnose(&self, business_id: &str) -> DiagnosticReport {
        let graph = match self.load_graph(business_id).await {
            Ok(graph) => graph,
            Err(failure) => return DiagnosticReport::error(failure.body.error),
        };

        let Some(entry) = graph.entry_node() else {
            return DiagnosticReport::error("Workflow has no GenAI intent node");
        };
        let Some(config) = entry.genai_config() else {
            return DiagnosticReport::error("GenAI intent node is not configured");
        };
        if config.model.trim().is_empty() {
            return DiagnosticReport::error(MODEL_MISSING);
        }
        if config.api_key.trim().is_empty() {
            return DiagnosticReport::error(API_KEY_MISSING);
        }

        let outcome = self
            .classifier()
            .test_configuration(config, DIAGNOSTIC_SAMPLE_MESSAGE)
            .await;
        if outcome.valid {
            info!(business_id, model = %config.model, "GenAI diagnostic passed");
            DiagnosticReport::success(format!("GenAI configuration is working (model {})", config.model))
        } else {
            warn!(business_id, model = %config.model, "GenAI diagnostic failed");
            DiagnosticReport::error(outcome.error.unwrap_or_else(|| "GenAI configuration test failed".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::crypto::PlaintextDecryptor;
    use crate::engine::executor::EngineConfig;
    use crate::engine::modules::{ModuleOutcome, ModuleRegistry};
    use crate::engine::node_config::NodeConfigService;
    use crate::engine::storage::{InMemoryChatStorage, InMemoryIdentityProvider, InMemoryWorkflowStorage};
    use crate::engine::test_support::{support_document, StubModule, StubProvider};
    use crate::llm::providers::ProviderRegistry;
    use crate::llm::{LLMError, LLMProviderType};
    use crate::models::{GenAIConfig, ModuleType, Node, NodeConfig};

    struct Harness {
        service: ChatService,
        chats: Arc<InMemoryChatStorage>,
        provider: Arc<StubProvider>,
        tracking: Arc<StubModule>,
    }

    async fn harness_with(provider: Arc<StubProvider>, document: crate::models::WorkflowDocument) -> Harness {
        let workflows = Arc::new(InMemoryWorkflowStorage::new());
        let chats = Arc::new(InMemoryChatStorage::new());
        let identity = Arc::new(InMemoryIdentityProvider::new().with_business("user-1", "biz-1", "Demo Shop"));
        let classifier = IntentClassifier::new(ProviderRegistry::new().with_client(provider.clone()));

        NodeConfigService::new(workflows.clone(), Arc::new(PlaintextDecryptor), classifier.clone())
            .import_document(&document)
            .await
            .unwrap();

        let tracking = StubModule::new(ModuleType::Tracking, Ok(ModuleOutcome::reply("Your order is out for delivery")));
        let engine = WorkflowExecutionEngine::new(
            classifier,
            ModuleRegistry::new().with_executor(tracking.clone()),
            EngineConfig::default(),
        );
        let resolver = ConfigResolver::new(workflows.clone(), Arc::new(PlaintextDecryptor));
        let service = ChatService::new(identity, chats.clone(), workflows, resolver, engine);

        Harness {
            service,
            chats,
            provider,
            tracking,
        }
    }

    async fn harness(reply: &str) -> Harness {
        harness_with(StubProvider::replying(LLMProviderType::Google, reply), support_document()).await
    }

    async fn history_len(harness: &Harness) -> usize {
        let session = harness.chats.get_or_create_chat_session("user-1", "biz-1").await.unwrap();
        harness.chats.get_chat_history(session.id).await.unwrap().len()
    }

    #[tokio::test]
    async fn test_order_status_chat_turn() {
        let h = harness(r#"{"intent": "order_query", "data": {"order_id": "1234"}}"#).await;

        let response = h
            .service
            .handle_chat(Some(Identity::new("user-1")), ChatRequest::new("Where is my order #1234?"))
            .await
            .unwrap();

        assert_eq!(response.method, CommunicationMethod::ModuleToFrontend);
        assert_eq!(response.intent, Some(Intent::OrderQuery));
        assert_eq!(response.response.as_deref(), Some("Your order is out for delivery"));
        let debug = response.debug.unwrap();
        assert_eq!(debug.business_id.as_deref(), Some("biz-1"));
        assert_eq!(debug.workflow_id.as_deref(), Some("wf-support"));
        assert_eq!(debug.execution_path, vec!["intent", "router", "tracking", "reply"]);
        assert_eq!(h.tracking.seen_nodes(), vec!["tracking"]);
    }

    #[tokio::test]
    async fn test_history_grows_by_two_per_turn() {
        let h = harness(r#"{"intent": "order_query"}"#).await;
        assert_eq!(history_len(&h).await, 0);

        for expected in [2, 4] {
            h.service
                .handle_chat(Some(Identity::new("user-1")), ChatRequest::new("Where is #1234?"))
                .await
                .unwrap();
            assert_eq!(history_len(&h).await, expected);
        }

        // the second classification saw the first turn
        let request = h.provider.last_request().unwrap();
        assert!(request.messages.iter().any(|m| m.content == "Your order is out for delivery"));
    }

    #[tokio::test]
    async fn test_classifier_history_excludes_new_message() {
        let h = harness(r#"{"intent": "order_query"}"#).await;
        let user = || Some(Identity::new("user-1"));

        h.service
            .handle_chat(user(), ChatRequest::new("Where is #1234?"))
            .await
            .unwrap();
        let prior = history_len(&h).await;
        assert_eq!(prior, 2);

        let message = "And what about order #5678?";
        h.service.handle_chat(user(), ChatRequest::new(message)).await.unwrap();

        // system prompt, the N stored turns, then the new message once
        let request = h.provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 1 + prior + 1);
        let occurrences = request.messages.iter().filter(|m| m.content == message).count();
        assert_eq!(occurrences, 1);
        assert_eq!(request.messages.last().unwrap().content, message);
        assert_eq!(history_len(&h).await, prior + 2);
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let h = harness("{}").await;
        let failure = h.service.handle_chat(None, ChatRequest::new("hi")).await.unwrap_err();
        assert_eq!(failure.status, 401);
        assert_eq!(failure.body.method, CommunicationMethod::FrontendToBlitz);
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let h = harness("{}").await;
        let failure = h
            .service
            .handle_chat(Some(Identity::new("user-1")), ChatRequest::new("   "))
            .await
            .unwrap_err();
        assert_eq!(failure.status, 400);
        assert_eq!(h.chats.session_count(), 0);
    }

    #[tokio::test]
    async fn test_business_without_workflow() {
        let h = harness("{}").await;
        let failure = h
            .service
            .handle_chat(Some(Identity::new("someone-else")), ChatRequest::new("hi"))
            .await
            .unwrap_err();
        assert_eq!(failure.status, 400);
        assert!(failure.body.error.contains("No active workflow"));
    }

    #[tokio::test]
    async fn test_missing_api_key_gets_friendly_message() {
        let mut document = support_document();
        document.nodes[0] = Node::new("intent", NodeConfig::GenAIIntent(GenAIConfig::new("gemini-pro", "")));
        let h = harness_with(StubProvider::replying(LLMProviderType::Google, "{}"), document).await;

        let failure = h
            .service
            .handle_chat(Some(Identity::new("user-1")), ChatRequest::new("hi"))
            .await
            .unwrap_err();
        assert_eq!(failure.status, 400);
        assert_eq!(failure.body.error, API_KEY_MISSING);
        let debug = failure.body.debug.unwrap();
        assert!(debug.execution_id.is_some());
        assert_eq!(debug.execution_path, vec!["intent"]);
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_error_is_not_surfaced_verbatim() {
        let provider = StubProvider::failing(
            LLMProviderType::Google,
            LLMError::Internal("upstream exploded: quota project 42".to_string()),
        );
        let h = harness_with(provider, support_document()).await;

        let failure = h
            .service
            .handle_chat(Some(Identity::new("user-1")), ChatRequest::new("Where is #1234?"))
            .await
            .unwrap_err();
        assert_eq!(failure.status, 400);
        assert_eq!(failure.body.error, EXECUTION_FAILED);
        let debug = failure.body.debug.unwrap();
        assert!(debug.detail.unwrap().contains("upstream exploded"));
        assert_eq!(debug.errors[0].code, ExecutionErrorKind::Provider);
        // the user message is still recorded
        assert_eq!(history_len(&h).await, 1);
    }

    #[tokio::test]
    async fn test_diagnostic_reports_working_configuration() {
        let h = harness(r#"{"intent": "general_query"}"#).await;
        let report = h.service.diagnose("biz-1").await;
        assert!(report.is_success(), "{:?}", report);
        assert_eq!(h.chats.session_count(), 0);

        let report = h.service.diagnose("biz-unknown").await;
        assert_eq!(report.status, "error");
    }
}
