// Blitz HTTP API module
// Serves the chat endpoint and the builder's diagnostic endpoints

//! # HTTP API
//!
//! | Method | Path                                                   | Purpose                      |
//! |--------|--------------------------------------------------------|------------------------------|
//! | POST   | `/api/blitz/chat`                                      | one chat turn                |
//! | GET    | `/api/blitz/test-genai?businessId=`                    | GenAI node diagnostic        |
//! | POST   | `/api/blitz/test-api`                                  | test a model/API key pair    |
//! | PUT    | `/api/blitz/workflows/:workflow_id/nodes/:node_id/config` | save a node configuration |
//! | GET    | `/health`                                              | liveness                     |
//!
//! The caller is identified by the `x-user-id` header.

pub mod handlers;
pub mod types;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::engine::chat::ChatService;
use crate::engine::node_config::NodeConfigService;
use crate::{BlitzError, Result};
use handlers::{chat, health_check, not_found, save_node_config, test_api, test_genai, BlitzApiState};

/// Blitz API server
pub struct BlitzApiServer {
    config: ServerConfig,
    state: BlitzApiState,
}

impl BlitzApiServer {
    pub fn new(config: ServerConfig, chat: ChatService, node_configs: NodeConfigService) -> Self {
        Self {
            config,
            state: BlitzApiState::new(chat, node_configs),
        }
    }

    /// Create the Axum router with every Blitz route
    pub fn create_router(&self) -> Router {
        let api_router = Router::new()
            .route("/api/blitz/chat", post(chat))
            .route("/api/blitz/test-genai", get(test_genai))
            .route("/api/blitz/test-api", post(test_api))
            .route(
                "/api/blitz/workflows/:workflow_id/nodes/:node_id/config",
                put(save_node_config),
            )
            .route("/health", get(health_check))
            .fallback(not_found)
            .with_state(self.state.clone());

        if self.config.cors_enabled {
            api_router.layer(CorsLayer::permissive())
        } else {
            api_router
        }
    }

    /// Run the server until the process is stopped
    pub async fn run(self) -> Result<()> {
        let app = self.create_router();
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let socket = addr
            .parse()
            .map_err(|e| BlitzError::Configuration(format!("invalid bind address {}: {}", addr, e)))?;

        info!("⚡ Blitz API server starting");
        info!("📡 Server address: http://{}", addr);
        info!("🔗 API endpoints:");
        info!("   POST http://{}/api/blitz/chat", addr);
        info!("   GET  http://{}/api/blitz/test-genai", addr);
        info!("   POST http://{}/api/blitz/test-api", addr);
        info!("   GET  http://{}/health", addr);
        info!("   CORS enabled: {}", self.config.cors_enabled);

        axum::Server::bind(&socket)
            .serve(app.into_make_service())
            .await
            .map_err(|e| BlitzError::Internal(e.to_string()))
    }
}

/// Builder pattern for the Blitz API server
#[derive(Default)]
pub struct BlitzApiServerBuilder {
    config: ServerConfig,
    chat: Option<ChatService>,
    node_configs: Option<NodeConfigService>,
}

impl BlitzApiServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn with_chat_service(mut self, chat: ChatService) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn with_node_config_service(mut self, node_configs: NodeConfigService) -> Self {
        self.node_configs = Some(node_configs);
        self
    }

    pub fn build(self) -> Result<BlitzApiServer> {
        let chat = self
            .chat
            .ok_or_else(|| BlitzError::Configuration("chat service is required".to_string()))?;
        let node_configs = self
            .node_configs
            .ok_or_else(|| BlitzError::Configuration("node configuration service is required".to_string()))?;
        Ok(BlitzApiServer::new(self.config, chat, node_configs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::crypto::PlaintextDecryptor;
    use crate::engine::executor::{EngineConfig, WorkflowExecutionEngine};
    use crate::engine::modules::{ModuleOutcome, ModuleRegistry};
    use crate::engine::resolver::ConfigResolver;
    use crate::engine::storage::{InMemoryChatStorage, InMemoryIdentityProvider, InMemoryWorkflowStorage};
    use crate::engine::test_support::{support_document, StubModule, StubProvider};
    use crate::llm::classifier::IntentClassifier;
    use crate::llm::providers::ProviderRegistry;
    use crate::llm::LLMProviderType;
    use crate::models::ModuleType;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_server(provider_reply: &str) -> BlitzApiServer {
        let workflows = Arc::new(InMemoryWorkflowStorage::new());
        let provider = StubProvider::replying(LLMProviderType::Google, provider_reply);
        let classifier = IntentClassifier::new(ProviderRegistry::new().with_client(provider));
        let node_configs = NodeConfigService::new(workflows.clone(), Arc::new(PlaintextDecryptor), classifier.clone());
        node_configs.import_document(&support_document()).await.unwrap();

        let tracking = StubModule::new(ModuleType::Tracking, Ok(ModuleOutcome::reply("Your order is out for delivery")));
        let engine = WorkflowExecutionEngine::new(
            classifier,
            ModuleRegistry::new().with_executor(tracking),
            EngineConfig::default(),
        );
        let chat = ChatService::new(
            Arc::new(InMemoryIdentityProvider::new().with_business("user-1", "biz-1", "Demo Shop")),
            Arc::new(InMemoryChatStorage::new()),
            workflows.clone(),
            ConfigResolver::new(workflows, Arc::new(PlaintextDecryptor)),
            engine,
        );

        BlitzApiServerBuilder::new()
            .with_chat_service(chat)
            .with_node_config_service(node_configs)
            .build()
            .unwrap()
    }

    async fn send(server: &BlitzApiServer, request: Request<Body>) -> (StatusCode, Value) {
        let response = server.create_router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn chat_request(user: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/blitz/chat")
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_builder_requires_services() {
        let err = BlitzApiServerBuilder::new().with_port(8080).build().err().unwrap();
        assert!(matches!(err, BlitzError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let server = test_server("{}").await;
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&server, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_chat_returns_module_answer() {
        let server = test_server(r#"{"intent": "order_query"}"#).await;
        let (status, body) = send(
            &server,
            chat_request(Some("user-1"), json!({"message": "Where is my order #1234?"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["method"], "MODULE_TO_FRONTEND");
        assert_eq!(body["intent"], "order_query");
        assert_eq!(body["response"], "Your order is out for delivery");
        assert_eq!(body["debug"]["businessId"], "biz-1");
        assert_eq!(body["debug"]["executionPath"][2], "tracking");
    }

    #[tokio::test]
    async fn test_chat_without_identity_is_401() {
        let server = test_server("{}").await;
        let (status, body) = send(&server, chat_request(None, json!({"message": "hi"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["method"], "FRONTEND_TO_BLITZ");
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_chat_with_missing_message_is_400() {
        let server = test_server("{}").await;
        let (status, body) = send(&server, chat_request(Some("user-1"), json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["method"], "FRONTEND_TO_BLITZ");
    }

    #[tokio::test]
    async fn test_unrouted_intent_is_400_with_trace() {
        let server = test_server(r#"{"intent": "refund_query"}"#).await;
        let (status, body) = send(
            &server,
            chat_request(Some("user-1"), json!({"message": "refund #1234 please"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Workflow execution failed");
        assert_eq!(body["debug"]["executionPath"], json!(["intent", "router"]));
        assert_eq!(body["debug"]["errors"][0]["code"], "UNROUTED_INTENT");
        assert!(body["debug"]["executionId"].is_string());
    }

    #[tokio::test]
    async fn test_genai_diagnostic() {
        let server = test_server(r#"{"intent": "general_query"}"#).await;

        let request = Request::builder()
            .uri("/api/blitz/test-genai?businessId=biz-1")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&server, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");

        let request = Request::builder().uri("/api/blitz/test-genai").body(Body::empty()).unwrap();
        let (status, _) = send(&server, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_api_key_endpoint() {
        let server = test_server(r#"{"intent": "general_query"}"#).await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/blitz/test-api")
            .header("content-type", "application/json")
            .body(Body::from(json!({"model": "gemini-pro", "apiKey": "key"}).to_string()))
            .unwrap();
        let (status, body) = send(&server, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/blitz/test-api")
            .header("content-type", "application/json")
            .body(Body::from(json!({"model": "gpt-4o", "apiKey": "key"}).to_string()))
            .unwrap();
        let (status, body) = send(&server, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("gpt-4o"));
    }

    fn save_config_request(user: Option<&str>, workflow_id: &str, node_id: &str, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::PUT)
            .uri(format!("/api/blitz/workflows/{}/nodes/{}/config", workflow_id, node_id))
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_save_node_config_endpoint() {
        let server = test_server("{}").await;
        let router_config = json!({"type": "router", "config": {"intent_mappings": {"order_query": "tracking"}}});

        let (status, body) = send(
            &server,
            save_config_request(Some("user-1"), "wf-support", "router", router_config),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["isConfigured"], true);

        let (status, _) = send(
            &server,
            save_config_request(Some("user-1"), "missing", "router", json!({"type": "response"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_save_node_config_requires_owner() {
        let server = test_server(r#"{"intent": "order_query"}"#).await;
        let genai = json!({"type": "genai-intent", "config": {"model": "gemini-pro", "api_key": "other-key"}});

        let (status, body) = send(&server, save_config_request(None, "wf-support", "intent", genai.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication required");

        // a caller with a business of their own cannot touch biz-1's workflow
        let (status, _) = send(&server, save_config_request(Some("intruder"), "wf-support", "intent", genai)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // the stored credential still serves the owner's chat
        let (status, _) = send(
            &server,
            chat_request(Some("user-1"), json!({"message": "Where is my order #1234?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let server = test_server("{}").await;
        let request = Request::builder().uri("/v1/models").body(Body::empty()).unwrap();
        let (status, _) = send(&server, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
