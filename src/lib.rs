// Blitz Workflow - Rust Edition
// Customer-support chat automation driven by user-authored node graphs

//! # Blitz Workflow Library
//!
//! This is the library root for Blitz, the chat automation engine behind the
//! storefront support widget. A business authors a small directed graph in the
//! visual builder; every inbound chat message is answered by walking that graph:
//!
//! ```text
//! genai-intent  ──▶  router  ──▶  module (tracking, refund, ...)  ──▶  response
//! ```
//!
//! ## Core Components
//!
//! ### Domain Models (`models`)
//! - [`Node`] / [`NodeConfig`]: typed graph nodes and their configuration
//! - [`WorkflowGraph`]: immutable node/edge snapshot with adjacency lookup
//! - [`ExecutionContext`] / [`ExecutionResult`]: the input and output of one run
//! - [`Intent`]: the closed set of labels the classifier may return
//!
//! ### Engine (`engine`)
//! - [`WorkflowExecutionEngine`]: the state machine that sequences node execution
//! - [`ConfigResolver`]: loads a workflow and decrypts node credentials
//! - [`ModuleRegistry`]: business module executors keyed by module type
//! - [`ChatService`]: the chat turn around one engine run (history, persistence)
//!
//! ### GenAI Adapter (`llm`)
//! - [`IntentClassifier`]: validates GenAI configuration and classifies messages
//! - Provider clients for Google Gemini and Perplexity
//!
//! ### HTTP API (`api`)
//! Axum routes for the chat endpoint and the diagnostic endpoints.
//!
//! ## Rust Learning Notes:
//!
//! ### Re-exports
//! `pub use` statements create shortcuts so users don't need to know the internal
//! module structure. Instead of `use blitz_workflow::engine::executor::WorkflowExecutionEngine`,
//! users can write `use blitz_workflow::WorkflowExecutionEngine`.

// Core domain models (nodes, graphs, execution records, chat records)
pub mod models;

// Execution engine, configuration resolution, module executors, storage
pub mod engine;

// GenAI providers and the intent classifier adapter
pub mod llm;

// Axum HTTP surface
pub mod api;

// Layered application configuration
pub mod config;

// Re-export core domain types for easy access
pub use models::{
    ApiConfig, ChatMessage, ChatRole, ChatSession, CommunicationMethod, ConversationTurn, Edge,
    ExecutionContext, ExecutionError, ExecutionErrorKind, ExecutionResult, ExecutionState,
    GenAIConfig, Intent, ModuleConfig, ModuleType, Node, NodeConfig, NodeType, Payload,
    RouterConfig, Workflow, WorkflowGraph,
};

// Re-export engine types for convenience
pub use engine::{
    chat::{ChatFailure, ChatRequest, ChatResponse, ChatService},
    crypto::{AesGcmDecryptor, Decryptor, Encryptor, PlaintextDecryptor},
    executor::{EngineConfig, WorkflowExecutionEngine},
    formatter::{FormattedResponse, ResponseFormatter},
    modules::{ModuleExecutor, ModuleRegistry},
    resolver::{ConfigLoadError, ConfigResolver},
    storage::{
        ChatStorage, IdentityProvider, InMemoryChatStorage, InMemoryIdentityProvider,
        InMemoryWorkflowStorage, WorkflowStorage,
    },
};

pub use llm::classifier::{Classification, ClassifierError, ConfigTestResult, IntentClassifier};

pub use api::{BlitzApiServer, BlitzApiServerBuilder};

// Core error types
use thiserror::Error;

/// Errors raised by collaborators and services outside the per-run state machine
///
/// Node-level failures during a run are not reported through this type; they
/// are recorded as [`ExecutionError`] entries on the [`ExecutionResult`] so the
/// caller can attribute them to a node.
///
/// ## Rust Learning Notes:
///
/// ### The `thiserror` Crate
/// - `#[derive(Error)]` implements the `std::error::Error` trait
/// - `#[error("...")]` provides human-readable error messages
/// - `#[from]` enables automatic conversion from other error types with `?`
#[derive(Error, Debug)]
pub enum BlitzError {
    /// A workflow definition cannot be found
    #[error("Workflow not found: {id}")]
    WorkflowNotFound { id: String },

    /// A node id does not exist in the workflow graph
    #[error("Node {node_id} not found in workflow {workflow_id}")]
    NodeNotFound { workflow_id: String, node_id: String },

    /// Invalid input supplied by a caller
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The caller has no authenticated identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Application configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Credential encryption or decryption failed
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Storage backend failures
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for BlitzError {
    fn from(err: std::io::Error) -> Self {
        BlitzError::Internal(err.to_string())
    }
}

/// Type alias for Results that use our custom error type
pub type Result<T> = std::result::Result<T, BlitzError>;
