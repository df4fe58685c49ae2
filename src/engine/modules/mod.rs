//! Business module executors
//!
//! Each `module` node runs one business capability. Executors receive the
//! detected intent, the execution context and the node's [`ModuleConfig`], and
//! return either a final answer or a hand-off to the next connected node.
//!
//! External API failures are recovered locally into an apologetic fallback
//! whenever the node allows it, so a transport blip never dead-ends a
//! customer conversation. The recovered error still travels back to the engine
//! for the execution trace.
//!
//! ## Rust Learning Notes:
//!
//! ### Borrowed Inputs Across `.await`
//! [`ModuleInput`] only borrows from the engine's run state. `#[async_trait]`
//! ties the returned future to those borrows, so the executor can hold them
//! across its HTTP calls without cloning the context.

pub mod api_client;
pub mod faq;
pub mod order_actions;
pub mod tracking;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use crate::llm::classifier::Classification;
use crate::models::{
    CommunicationMethod, ExecutionContext, ExecutionError, ExecutionErrorKind, Intent, ModuleConfig, ModuleType,
    Payload,
};

pub use api_client::{HttpModuleApiClient, ModuleApiClient, ModuleApiError};
pub use faq::FaqModule;
pub use order_actions::{OrderAction, OrderActionModule};
pub use tracking::TrackingModule;

/// Everything a module sees for one hop
#[derive(Debug, Clone, Copy)]
pub struct ModuleInput<'a> {
    pub node_id: &'a str,
    pub intent: Intent,
    pub context: &'a ExecutionContext,
    pub config: &'a ModuleConfig,
    pub classification: &'a Classification,
    /// Structured data accumulated so far (classifier output, upstream modules)
    pub extracted_data: Option<&'a Value>,
    /// Payload handed over by an upstream module in a chain
    pub upstream: Option<&'a Payload>,
}

impl<'a> ModuleInput<'a> {
    /// Order id from structured data, else from the message text
    pub fn order_id(&self) -> Option<String> {
        extract_order_id(self.extracted_data, &self.context.message)
    }
}

/// What a module produced
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleOutcome {
    /// True when this payload is the answer; false hands off downstream
    pub is_final: bool,
    pub payload: Option<Payload>,
    pub method: CommunicationMethod,
    /// Structured data to merge into the run state
    pub extracted_data: Option<Value>,
    /// Explicit downstream node; defaults to the first connected node
    pub next_node_id: Option<String>,
    /// External failure that was degraded into a fallback answer
    pub recovered_error: Option<ExecutionError>,
}

impl ModuleOutcome {
    /// Final answer authored by a business module
    pub fn reply(payload: impl Into<Payload>) -> Self {
        Self {
            is_final: true,
            payload: Some(payload.into()),
            method: CommunicationMethod::ModuleToFrontend,
            extracted_data: None,
            next_node_id: None,
            recovered_error: None,
        }
    }

    /// Hand the payload to the next connected node
    pub fn handoff(payload: Option<Payload>) -> Self {
        Self {
            is_final: false,
            payload,
            method: CommunicationMethod::ModuleToFrontend,
            extracted_data: None,
            next_node_id: None,
            recovered_error: None,
        }
    }

    pub fn with_method(mut self, method: CommunicationMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.extracted_data = Some(data);
        self
    }

    pub fn with_next(mut self, node_id: impl Into<String>) -> Self {
        self.next_node_id = Some(node_id.into());
        self
    }

    pub fn with_recovered_error(mut self, error: ExecutionError) -> Self {
        self.recovered_error = Some(error);
        self
    }
}

/// A module failure that ends the run
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ModuleFailure {
    pub kind: ExecutionErrorKind,
    pub message: String,
    pub details: Option<Value>,
}

impl ModuleFailure {
    pub fn new(kind: ExecutionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn into_execution_error(self, node_id: &str) -> ExecutionError {
        let error = ExecutionError::new(self.kind, self.message).at_node(node_id);
        match self.details {
            Some(details) => error.with_details(details),
            None => error,
        }
    }
}

impl From<ModuleApiError> for ModuleFailure {
    fn from(err: ModuleApiError) -> Self {
        let details = err.details();
        Self {
            kind: ExecutionErrorKind::Provider,
            message: err.to_string(),
            details: Some(details),
        }
    }
}

/// Behavior of one module type
#[async_trait]
pub trait ModuleExecutor: Send + Sync {
    fn module_type(&self) -> ModuleType;

    async fn execute(&self, input: ModuleInput<'_>) -> Result<ModuleOutcome, ModuleFailure>;
}

/// Degrade an API failure into the node's fallback answer, or fail the run
pub(crate) fn recover_or_fail(
    input: &ModuleInput<'_>,
    err: ModuleApiError,
    default_fallback: &str,
) -> Result<ModuleOutcome, ModuleFailure> {
    let failure = ModuleFailure::from(err);
    match input.config.fallback_text(default_fallback) {
        Some(text) => {
            tracing::warn!(node_id = input.node_id, "Module API failed, answering with fallback: {}", failure);
            let recovered = failure.into_execution_error(input.node_id).recovered();
            Ok(ModuleOutcome::reply(text).with_recovered_error(recovered))
        }
        None => Err(failure),
    }
}

/// Module executors keyed by module type
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    executors: HashMap<ModuleType, Arc<dyn ModuleExecutor>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All built-in module types over one API client
    pub fn with_defaults(api: Arc<dyn ModuleApiClient>) -> Self {
        Self::new()
            .with_executor(Arc::new(TrackingModule::new(api.clone())))
            .with_executor(Arc::new(OrderActionModule::new(OrderAction::Cancel, api.clone())))
            .with_executor(Arc::new(OrderActionModule::new(OrderAction::Refund, api.clone())))
            .with_executor(Arc::new(OrderActionModule::new(OrderAction::Modify, api)))
            .with_executor(Arc::new(FaqModule))
    }

    /// Register (or replace) the executor for its module type
    pub fn with_executor(mut self, executor: Arc<dyn ModuleExecutor>) -> Self {
        self.executors.insert(executor.module_type(), executor);
        self
    }

    pub fn get(&self, module_type: ModuleType) -> Option<Arc<dyn ModuleExecutor>> {
        self.executors.get(&module_type).cloned()
    }
}

fn order_id_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"#\s*([A-Za-z0-9][A-Za-z0-9_-]*)").expect("valid order hash pattern"),
            Regex::new(r"\b(\d{4,})\b").expect("valid order digits pattern"),
        ]
    })
}

fn is_safe_order_id(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= 64
        && candidate.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Order id from `data.order_id` (string or number), else `#1234` or a long
/// digit run in `message`
///
/// Ids are restricted to URL-safe characters so they can be substituted into
/// binding URLs verbatim.
pub fn extract_order_id(data: Option<&Value>, message: &str) -> Option<String> {
    let from_data = data.and_then(|d| d.get("order_id")).and_then(|v| match v {
        Value::String(s) => Some(s.trim().trim_start_matches('#').to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    if let Some(id) = from_data.filter(|id| is_safe_order_id(id)) {
        return Some(id);
    }

    order_id_patterns()
        .iter()
        .find_map(|pattern| pattern.captures(message))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|id| is_safe_order_id(id))
}
