//! Stubs shared by the engine, classifier and API tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::modules::{ModuleApiClient, ModuleApiError, ModuleExecutor, ModuleFailure, ModuleInput, ModuleOutcome};
use crate::llm::classifier::Classification;
use crate::llm::traits::{LLMProviderClient, ModelInfo};
use crate::llm::{LLMError, LLMProviderType, LLMRequest, LLMResponse, LLMResult, TokenUsage};
use crate::models::{
    ApiConfig, CommunicationMethod, Edge, ExecutionContext, GenAIConfig, HttpMethod, Intent, ModuleConfig,
    ModuleType, Node, NodeConfig, RouterConfig, WorkflowDocument,
};

enum StubReply {
    Text(String),
    Error(LLMError),
    Hang,
}

/// Provider client that answers from a script and records requests
pub struct StubProvider {
    provider: LLMProviderType,
    reply: StubReply,
    calls: AtomicUsize,
    last_request: Mutex<Option<(LLMRequest, String)>>,
}

impl StubProvider {
    fn with_reply(provider: LLMProviderType, reply: StubReply) -> Arc<Self> {
        Arc::new(Self {
            provider,
            reply,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn replying(provider: LLMProviderType, text: &str) -> Arc<Self> {
        Self::with_reply(provider, StubReply::Text(text.to_string()))
    }

    pub fn failing(provider: LLMProviderType, error: LLMError) -> Arc<Self> {
        Self::with_reply(provider, StubReply::Error(error))
    }

    pub fn hanging(provider: LLMProviderType) -> Arc<Self> {
        Self::with_reply(provider, StubReply::Hang)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<LLMRequest> {
        self.last_request.lock().unwrap().as_ref().map(|(request, _)| request.clone())
    }

    pub fn last_api_key(&self) -> Option<String> {
        self.last_request.lock().unwrap().as_ref().map(|(_, key)| key.clone())
    }
}

#[async_trait]
impl LLMProviderClient for StubProvider {
    async fn chat_completion(&self, request: &LLMRequest, api_key: &str) -> LLMResult<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some((request.clone(), api_key.to_string()));

        match &self.reply {
            StubReply::Text(text) => Ok(LLMResponse {
                id: "stub".to_string(),
                model: request.model.clone(),
                content: text.clone(),
                finish_reason: Some("stop".to_string()),
                usage: TokenUsage::default(),
                provider: self.provider,
            }),
            StubReply::Error(error) => Err(error.clone()),
            StubReply::Hang => {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Err(LLMError::Timeout("stub never answers".to_string()))
            }
        }
    }

    fn provider_type(&self) -> LLMProviderType {
        self.provider
    }

    fn get_available_models(&self) -> Vec<ModelInfo> {
        Vec::new()
    }
}

/// Module API client answering per binding alias
#[derive(Default)]
pub struct StubModuleApi {
    replies: HashMap<String, Result<Value, ModuleApiError>>,
    calls: Mutex<Vec<(String, Option<String>, Option<Value>)>>,
}

impl StubModuleApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(self: Arc<Self>, alias: &str, body: Value) -> Arc<Self> {
        Self::script(self, alias, Ok(body))
    }

    pub fn fail(self: Arc<Self>, alias: &str, error: ModuleApiError) -> Arc<Self> {
        Self::script(self, alias, Err(error))
    }

    fn script(this: Arc<Self>, alias: &str, reply: Result<Value, ModuleApiError>) -> Arc<Self> {
        let mut inner = Arc::try_unwrap(this).unwrap_or_else(|_| panic!("stub already shared"));
        inner.replies.insert(alias.to_string(), reply);
        Arc::new(inner)
    }

    /// `(alias, order id)` of every call, in order
    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(alias, order_id, _)| (alias.clone(), order_id.clone()))
            .collect()
    }

    pub fn last_body(&self, alias: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(called, _, _)| called == alias)
            .and_then(|(_, _, body)| body.clone())
    }
}

#[async_trait]
impl ModuleApiClient for StubModuleApi {
    async fn call(&self, api: &ApiConfig, order_id: Option<&str>, body: Option<&Value>) -> Result<Value, ModuleApiError> {
        self.calls
            .lock()
            .unwrap()
            .push((api.alias.clone(), order_id.map(str::to_string), body.cloned()));
        self.replies.get(&api.alias).cloned().unwrap_or_else(|| {
            Err(ModuleApiError::Transport {
                alias: api.alias.clone(),
                message: "no stubbed reply".to_string(),
            })
        })
    }
}

/// Module executor with a fixed outcome that counts its runs
pub struct StubModule {
    module_type: ModuleType,
    outcome: Result<ModuleOutcome, ModuleFailure>,
    runs: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl StubModule {
    pub fn new(module_type: ModuleType, outcome: Result<ModuleOutcome, ModuleFailure>) -> Arc<Self> {
        Arc::new(Self {
            module_type,
            outcome,
            runs: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Node ids this executor ran for, in order
    pub fn seen_nodes(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModuleExecutor for StubModule {
    fn module_type(&self) -> ModuleType {
        self.module_type
    }

    async fn execute(&self, input: ModuleInput<'_>) -> Result<ModuleOutcome, ModuleFailure> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(input.node_id.to_string());
        self.outcome.clone()
    }
}

pub fn context(message: &str) -> ExecutionContext {
    ExecutionContext::new("biz-1", "user-1", "wf-support", Uuid::new_v4(), Vec::new(), message)
}

pub fn classification(intent: Intent) -> Classification {
    Classification {
        intent,
        raw_response: format!("{{\"intent\":\"{}\"}}", intent),
        reply: None,
        data: None,
        method: CommunicationMethod::GenAIToFrontend,
    }
}

/// intent → router{order_query: tracking, general_query: faq, cancellation: cancel} → modules → reply
///
/// `refund_query` is deliberately unmapped.
pub fn support_nodes() -> (Vec<Node>, Vec<Edge>) {
    let mut genai = GenAIConfig::new("gemini-pro", "test-key");
    genai.api_key_validated = true;

    let nodes = vec![
        Node::new("intent", NodeConfig::GenAIIntent(genai)),
        Node::new(
            "router",
            NodeConfig::Router(
                RouterConfig::default()
                    .with_mapping("order_query", "tracking")
                    .with_mapping("general_query", "faq")
                    .with_mapping("cancellation", "cancel"),
            ),
        ),
        Node::new(
            "tracking",
            NodeConfig::Module(ModuleConfig::new(ModuleType::Tracking).with_api(ApiConfig::new(
                "shipment_status",
                "https://shop.test/orders/{order_id}/shipment",
                HttpMethod::Get,
            ))),
        ),
        Node::new("faq", NodeConfig::Module(ModuleConfig::new(ModuleType::Faq))),
        Node::new(
            "cancel",
            NodeConfig::Module(
                ModuleConfig::new(ModuleType::Cancellation)
                    .with_api(ApiConfig::new("order_lookup", "https://shop.test/orders/{order_id}", HttpMethod::Get))
                    .with_api(ApiConfig::new(
                        "cancel_order",
                        "https://shop.test/orders/{order_id}/cancel",
                        HttpMethod::Post,
                    )),
            ),
        ),
        Node::new("reply", NodeConfig::Response),
    ];
    let edges = vec![
        Edge::new("intent", "router"),
        Edge::new("router", "tracking").with_handle("order_query"),
        Edge::new("router", "faq").with_handle("general_query"),
        Edge::new("router", "cancel").with_handle("cancellation"),
        Edge::new("tracking", "reply"),
        Edge::new("faq", "reply"),
        Edge::new("cancel", "reply"),
    ];
    (nodes, edges)
}

pub fn support_document() -> WorkflowDocument {
    let (nodes, edges) = support_nodes();
    WorkflowDocument {
        id: Some("wf-support".to_string()),
        name: "Customer support".to_string(),
        business_id: "biz-1".to_string(),
        nodes,
        edges,
    }
}
