// Blitz REST API handlers
// Thin adapters between axum and the chat / node configuration services

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{ErrorBody, HealthResponse, TestApiRequest, TestGenAIQuery};
use crate::engine::chat::{ChatFailure, ChatRequest, ChatService};
use crate::engine::node_config::NodeConfigService;
use crate::models::{Identity, NodeConfig};
use crate::BlitzError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Shared state of the Blitz API
#[derive(Clone)]
pub struct BlitzApiState {
    pub chat: Arc<ChatService>,
    pub node_configs: Arc<NodeConfigService>,
}

impl BlitzApiState {
    pub fn new(chat: ChatService, node_configs: NodeConfigService) -> Self {
        Self {
            chat: Arc::new(chat),
            node_configs: Arc::new(node_configs),
        }
    }
}

/// Caller identity from the `x-user-id` header, if any
///
/// Authentication happens in front of this service; a missing header simply
/// means "no identity" and each handler decides what that implies.
pub struct CallerIdentity(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let identity = header(USER_ID_HEADER).map(|user_id| Identity {
            user_id,
            email: header(USER_EMAIL_HEADER),
        });
        Ok(CallerIdentity(identity))
    }
}

impl IntoResponse for ChatFailure {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body)).into_response()
    }
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(error))).into_response()
}

fn blitz_error_response(err: BlitzError) -> Response {
    let status = match &err {
        BlitzError::WorkflowNotFound { .. } | BlitzError::NodeNotFound { .. } => StatusCode::NOT_FOUND,
        BlitzError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        BlitzError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        warn!("Request failed: {}", err);
    }
    error_response(status, err.to_string())
}

/// Health check endpoint - GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse::ok())
}

/// Chat endpoint - POST /api/blitz/chat
pub async fn chat(
    State(state): State<BlitzApiState>,
    CallerIdentity(identity): CallerIdentity,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    if identity.is_none() {
        return ChatFailure::unauthorized().into_response();
    }
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!("Rejected chat body: {}", rejection);
            return ChatFailure::bad_request("Invalid request body", None).into_response();
        }
    };

    match state.chat.handle_chat(identity, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(failure) => failure.into_response(),
    }
}

/// GenAI diagnostic - GET /api/blitz/test-genai?businessId=
pub async fn test_genai(State(state): State<BlitzApiState>, Query(query): Query<TestGenAIQuery>) -> Response {
    let Some(business_id) = query.business_id.filter(|id| !id.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "businessId is required");
    };

    let report = state.chat.diagnose(business_id.trim()).await;
    let status = if report.is_success() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(report)).into_response()
}

/// Explicit credential test - POST /api/blitz/test-api
pub async fn test_api(
    State(state): State<BlitzApiState>,
    body: Result<Json<TestApiRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = body else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid request body");
    };

    let config = request.into_config();
    let result = state.node_configs.test_api_key(&config).await;
    info!(model = %config.model, key = %config.masked_api_key(), valid = result.valid, "GenAI credential tested");

    let status = if result.valid {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(result)).into_response()
}

/// Save one node's configuration - PUT /api/blitz/workflows/:workflow_id/nodes/:node_id/config
///
/// Only the business owning the workflow may change its nodes.
pub async fn save_node_config(
    State(state): State<BlitzApiState>,
    CallerIdentity(identity): CallerIdentity,
    Path((workflow_id, node_id)): Path<(String, String)>,
    body: Result<Json<NodeConfig>, JsonRejection>,
) -> Response {
    let Some(identity) = identity else {
        return error_response(StatusCode::UNAUTHORIZED, "Authentication required");
    };
    let config = match body {
        Ok(Json(config)) => config,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let account = match state.chat.caller_account(&identity).await {
        Ok(account) => account,
        Err(err) => return blitz_error_response(err),
    };

    match state
        .node_configs
        .save_owned_node_configuration(&account.business.id, &workflow_id, &node_id, config)
        .await
    {
        Ok(saved) => (StatusCode::OK, Json(saved)).into_response(),
        Err(err) => blitz_error_response(err),
    }
}

/// Fallback for unknown routes
pub async fn not_found() -> impl IntoResponse {
    error_response(StatusCode::NOT_FOUND, "Not found")
}
