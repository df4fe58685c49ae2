// Core domain models for Blitz
// These are the data structures shared by the engine, the API and storage

//! # Domain Models Module
//!
//! This module contains the core domain models for Blitz workflows:
//!
//! - `intent`: the closed set of classification labels
//! - `node`: typed nodes and their per-type configuration
//! - `workflow`: workflow metadata and the immutable graph snapshot
//! - `execution`: the context and result of one engine run
//! - `chat`: chat sessions, messages and account records owned by collaborators
//!
//! ## Rust Learning Notes:
//!
//! ### Re-exports for Clean APIs
//! The `pub use` statements at the bottom create a clean, flat API.
//! Users can import `use blitz_workflow::models::Node` instead of
//! `use blitz_workflow::models::node::Node`.

// Contains Intent - the classifier's closed label set
pub mod intent;

// Contains Node, NodeConfig and the per-type configuration structs
pub mod node;

// Contains Workflow, Edge and WorkflowGraph
pub mod workflow;

// Contains ExecutionContext, ExecutionResult and the error taxonomy
pub mod execution;

// Contains ChatSession, ChatMessage and account records
pub mod chat;

/// Re-export the intent label set
pub use intent::Intent;

/// Re-export node types
/// - Node: one behavioral unit in a workflow graph
/// - NodeConfig: tagged union over the four node kinds
/// - GenAIConfig / RouterConfig / ModuleConfig: per-kind configuration
/// - ApiConfig: a named external API binding used by modules
pub use node::{
    ApiConfig, GenAIConfig, HttpMethod, ModuleConfig, ModuleType, Node, NodeConfig, NodeType,
    RouterConfig, DEFAULT_API_TIMEOUT_MS,
};

/// Re-export workflow types
pub use workflow::{Edge, GraphError, Workflow, WorkflowDocument, WorkflowGraph};

/// Re-export execution types
pub use execution::{
    CommunicationMethod, ConversationTurn, ExecutionContext, ExecutionError, ExecutionErrorKind,
    ExecutionResult, ExecutionState, Payload,
};

/// Re-export chat and account types
pub use chat::{BusinessAccount, BusinessRecord, ChatMessage, ChatRole, ChatSession, Identity, UserRecord};
