//! HTTP client for module API bindings
//!
//! A binding names an endpoint (`https://shop.example/orders/{order_id}`), an
//! HTTP method, an optional bearer credential and a timeout. Non-2xx replies,
//! transport errors and timeouts all come back as [`ModuleApiError`]; nothing
//! is retried here.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::{ApiConfig, HttpMethod, DEFAULT_API_TIMEOUT_MS};

const ORDER_ID_PLACEHOLDER: &str = "{order_id}";

/// Failures of one bound API call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModuleApiError {
    #[error("API '{alias}' timed out after {timeout_ms}ms")]
    Timeout { alias: String, timeout_ms: u64 },

    #[error("API '{alias}' returned HTTP {status}")]
    Http { alias: String, status: u16, body: Option<Value> },

    #[error("API '{alias}' is unreachable: {message}")]
    Transport { alias: String, message: String },

    #[error("API '{alias}' needs an order id")]
    MissingOrderId { alias: String },
}

impl ModuleApiError {
    pub fn alias(&self) -> &str {
        match self {
            ModuleApiError::Timeout { alias, .. }
            | ModuleApiError::Http { alias, .. }
            | ModuleApiError::Transport { alias, .. }
            | ModuleApiError::MissingOrderId { alias } => alias,
        }
    }

    /// HTTP status when the endpoint answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ModuleApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Structured details for the execution trace; never includes credentials
    pub fn details(&self) -> Value {
        let mut details = json!({ "api": self.alias() });
        match self {
            ModuleApiError::Timeout { timeout_ms, .. } => {
                details["timeoutMs"] = json!(timeout_ms);
            }
            ModuleApiError::Http { status, .. } => {
                details["status"] = json!(status);
            }
            ModuleApiError::Transport { .. } | ModuleApiError::MissingOrderId { .. } => {}
        }
        details
    }
}

/// Calls one module API binding
#[async_trait]
pub trait ModuleApiClient: Send + Sync {
    /// Call `api`, substituting `order_id` into the URL and sending `body` for
    /// non-GET methods
    async fn call(&self, api: &ApiConfig, order_id: Option<&str>, body: Option<&Value>) -> Result<Value, ModuleApiError>;
}

/// `reqwest` implementation of [`ModuleApiClient`]
#[derive(Clone)]
pub struct HttpModuleApiClient {
    client: Client,
    /// Used for bindings whose `timeout_ms` is 0
    default_timeout_ms: u64,
}

impl Default for HttpModuleApiClient {
    fn default() -> Self {
        Self::with_client(Client::new())
    }
}

impl HttpModuleApiClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            default_timeout_ms: DEFAULT_API_TIMEOUT_MS,
        }
    }

    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    fn timeout_ms(&self, api: &ApiConfig) -> u64 {
        if api.timeout_ms == 0 {
            self.default_timeout_ms
        } else {
            api.timeout_ms
        }
    }
}

/// Substitute the order id placeholder into the binding URL
///
/// Returns the URL and whether the id was consumed by the placeholder.
pub fn resolve_url(api: &ApiConfig, order_id: Option<&str>) -> Result<(String, bool), ModuleApiError> {
    if !api.base_url.contains(ORDER_ID_PLACEHOLDER) {
        return Ok((api.base_url.clone(), false));
    }
    let order_id = order_id.ok_or_else(|| ModuleApiError::MissingOrderId {
        alias: api.alias.clone(),
    })?;
    Ok((api.base_url.replace(ORDER_ID_PLACEHOLDER, order_id), true))
}

#[async_trait]
impl ModuleApiClient for HttpModuleApiClient {
    async fn call(&self, api: &ApiConfig, order_id: Option<&str>, body: Option<&Value>) -> Result<Value, ModuleApiError> {
        let (url, substituted) = resolve_url(api, order_id)?;
        let timeout_ms = self.timeout_ms(api);

        let mut request = self
            .client
            .request(api.method.as_reqwest(), &url)
            .timeout(Duration::from_millis(timeout_ms));

        if let Some(credential) = api.credential.as_deref().filter(|c| !c.is_empty()) {
            request = request.bearer_auth(credential);
        }
        match (api.method, order_id, body) {
            (HttpMethod::Get, Some(id), _) if !substituted => {
                request = request.query(&[("order_id", id)]);
            }
            (HttpMethod::Get, _, _) => {}
            (_, _, Some(body)) => {
                request = request.json(body);
            }
            (_, _, None) => {}
        }

        debug!(alias = %api.alias, method = ?api.method, "Calling module API");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ModuleApiError::Timeout {
                    alias: api.alias.clone(),
                    timeout_ms,
                }
            } else {
                ModuleApiError::Transport {
                    alias: api.alias.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| ModuleApiError::Transport {
            alias: api.alias.clone(),
            message: e.to_string(),
        })?;
        let parsed = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if !status.is_success() {
            return Err(ModuleApiError::Http {
                alias: api.alias.clone(),
                status: status.as_u16(),
                body: Some(parsed),
            });
        }
        Ok(parsed)
    }
}
