// Execution records - the input and output of one engine run

//! # Execution Model
//!
//! - [`ExecutionContext`]: immutable input built once per inbound chat message
//! - [`ExecutionResult`]: output assembled while the engine walks the graph
//! - [`ExecutionError`]: a failure attributed to the node that raised it
//! - [`ExecutionState`]: the states of the engine's state machine
//!
//! ## State Machine
//!
//! ```text
//! Init → Classifying → Routing → ModuleExecuting ⟲ → Responding → Done
//!   └──────────────┴───────────┴──────────────────┴────────────▶ Failed
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use super::chat::ChatRole;
use super::intent::Intent;

/// Who authored the final content of a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommunicationMethod {
    /// Protocol-level and error responses produced by the host API itself
    #[serde(rename = "FRONTEND_TO_BLITZ")]
    FrontendToBlitz,
    /// A business module produced the payload
    #[serde(rename = "MODULE_TO_FRONTEND")]
    ModuleToFrontend,
    /// The classifier answered directly (FAQ)
    #[serde(rename = "GENAI_TO_FRONTEND")]
    GenAIToFrontend,
}

impl CommunicationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationMethod::FrontendToBlitz => "FRONTEND_TO_BLITZ",
            CommunicationMethod::ModuleToFrontend => "MODULE_TO_FRONTEND",
            CommunicationMethod::GenAIToFrontend => "GENAI_TO_FRONTEND",
        }
    }
}

/// One prior turn of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Immutable input to one engine run
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
    pub execution_id: Uuid,
    pub business_id: String,
    pub user_id: String,
    pub workflow_id: String,
    pub chat_session_id: Uuid,
    /// Prior turns, oldest first; never contains the current message
    pub history: Vec<ConversationTurn>,
    pub message: String,
    pub started_at: DateTime<Utc>,
}

impl ExecutionContext {
    /// Build a context with a fresh execution id and start timestamp
    ///
    /// Turns with empty or whitespace-only content are dropped here so no
    /// downstream consumer has to filter again.
    pub fn new(
        business_id: impl Into<String>,
        user_id: impl Into<String>,
        workflow_id: impl Into<String>,
        chat_session_id: Uuid,
        history: Vec<ConversationTurn>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            business_id: business_id.into(),
            user_id: user_id.into(),
            workflow_id: workflow_id.into(),
            chat_session_id,
            history: history
                .into_iter()
                .filter(|turn| !turn.content.trim().is_empty())
                .collect(),
            message: message.into(),
            started_at: Utc::now(),
        }
    }
}

/// The live payload: plain text or a structured object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Structured(Value),
}

impl Payload {
    pub fn text(content: impl Into<String>) -> Self {
        Payload::Text(content.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Structured(_) => None,
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Payload::Text(text),
            other => Payload::Structured(other),
        }
    }
}

/// Error taxonomy with stable wire codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionErrorKind {
    /// Missing or blank required configuration field
    #[serde(rename = "CONFIGURATION_ERROR")]
    Configuration,
    /// Model is not on the supported allow-list
    #[serde(rename = "UNSUPPORTED_MODEL")]
    UnsupportedModel,
    /// Workflow/node not found or credential decryption failure
    #[serde(rename = "CONFIG_LOAD_ERROR")]
    ConfigLoad,
    /// Classifier or module external API transport, timeout or HTTP failure
    #[serde(rename = "PROVIDER_ERROR")]
    Provider,
    /// Router has no mapping for the detected intent
    #[serde(rename = "UNROUTED_INTENT")]
    UnroutedIntent,
    /// The graph has no `genai-intent` entry node
    #[serde(rename = "MISSING_ENTRY_NODE")]
    MissingEntryNode,
    /// A `module → module` chain loops or exceeds the hop budget
    #[serde(rename = "GRAPH_CYCLE")]
    GraphCycle,
    /// Anything else
    #[serde(rename = "EXECUTION_ERROR")]
    Execution,
}

impl ExecutionErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ExecutionErrorKind::Configuration => "CONFIGURATION_ERROR",
            ExecutionErrorKind::UnsupportedModel => "UNSUPPORTED_MODEL",
            ExecutionErrorKind::ConfigLoad => "CONFIG_LOAD_ERROR",
            ExecutionErrorKind::Provider => "PROVIDER_ERROR",
            ExecutionErrorKind::UnroutedIntent => "UNROUTED_INTENT",
            ExecutionErrorKind::MissingEntryNode => "MISSING_ENTRY_NODE",
            ExecutionErrorKind::GraphCycle => "GRAPH_CYCLE",
            ExecutionErrorKind::Execution => "EXECUTION_ERROR",
        }
    }

    /// Configuration-class failures map to HTTP 400; the rest to 500
    pub fn is_configuration_class(&self) -> bool {
        !matches!(self, ExecutionErrorKind::Execution)
    }
}

impl fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A failure attributed to the node that raised it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub code: ExecutionErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// False for module failures that degraded into a fallback response
    #[serde(default = "default_fatal")]
    pub fatal: bool,
    pub timestamp: DateTime<Utc>,
}

fn default_fatal() -> bool {
    true
}

impl ExecutionError {
    pub fn new(code: ExecutionErrorKind, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            node_id: None,
            fatal: true,
            timestamp: Utc::now(),
        }
    }

    pub fn at_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn recovered(mut self) -> Self {
        self.fatal = false;
        self
    }
}

/// States of the engine's state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Init,
    Classifying,
    Routing,
    ModuleExecuting,
    Responding,
    Done,
    Failed,
}

/// Output of one engine run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub execution_id: Uuid,
    pub workflow_id: String,
    pub success: bool,
    /// Terminal state: `Done` or `Failed`
    pub state: ExecutionState,
    pub method: CommunicationMethod,
    pub intent: Option<Intent>,
    /// Final payload exactly as the last active node produced it
    pub response: Option<Payload>,
    pub extracted_data: Option<Value>,
    /// Ordered node ids visited
    pub execution_path: Vec<String>,
    pub total_execution_time: u64,
    pub errors: Vec<ExecutionError>,
}

impl ExecutionResult {
    /// First error that ended the run, if it failed
    pub fn fatal_error(&self) -> Option<&ExecutionError> {
        self.errors.iter().find(|error| error.fatal)
    }
}
