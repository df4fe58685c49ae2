// Blitz Engine
// Configuration loading, node execution and the chat turn orchestration

//! # Blitz Engine Module
//!
//! This module contains everything that runs when a chat message arrives, plus
//! the save path that prepares node configurations for it.
//!
//! ## Engine Components
//!
//! ### Storage (`storage` module)
//! - Collaborator traits for workflows, chat history and accounts
//! - In-memory implementations for development and tests
//!
//! ### Credential Encryption (`crypto` module)
//! - `Decryptor` / `Encryptor` traits injected where secrets are handled
//! - AES-256-GCM implementation
//!
//! ### Configuration Resolver (`resolver` module)
//! - Loads a workflow's graph with every node configuration decrypted
//! - Validates the graph before handing it to the engine
//!
//! ### Node Configuration (`node_config` module)
//! - Save-time validation: required fields, model allow-list, API bindings
//! - Credential test calls that decide `is_configured`
//!
//! ### Module Executors (`modules` module)
//! - tracking, cancellation, refund, modify-order, faq
//! - HTTP client for the API bindings modules call
//!
//! ### Response Formatter (`formatter` module)
//! - Normalizes text or structured payloads into the chat envelope
//!
//! ### Execution Engine (`executor` module)
//! - The state machine that walks a graph for one message
//!
//! ### Chat Service (`chat` module)
//! - The chat turn: identity, session, history, engine run, persistence
//!
//! ## Rust Learning Notes:
//!
//! ### Dependency Injection with `Arc<dyn Trait>`
//! Every collaborator is passed in as a trait object at construction time, so
//! tests wire stubs and the server wires real implementations without any
//! global state.

/// Collaborator traits and in-memory implementations
pub mod storage;

/// Credential encryption
pub mod crypto;

/// Workflow + configuration loading
pub mod resolver;

/// Node configuration save path
pub mod node_config;

/// Business module executors
pub mod modules;

/// Terminal response formatting
pub mod formatter;

/// Workflow execution state machine
pub mod executor;

/// Chat endpoint orchestration
pub mod chat;

#[cfg(test)]
pub(crate) mod test_support;

pub use chat::{ChatFailure, ChatRequest, ChatResponse, ChatService, DebugInfo, DiagnosticReport};
pub use crypto::{AesGcmDecryptor, Decryptor, Encryptor, PlaintextDecryptor};
pub use executor::{EngineConfig, WorkflowExecutionEngine};
pub use formatter::{FormattedResponse, ResponseFormatter};
pub use modules::{ModuleExecutor, ModuleRegistry};
pub use node_config::{NodeConfigService, SavedConfiguration};
pub use resolver::{ConfigLoadError, ConfigResolver};
pub use storage::{
    ChatStorage, IdentityProvider, InMemoryChatStorage, InMemoryIdentityProvider, InMemoryWorkflowStorage,
    NodeConfigRecord, NodeRecord, StoredGraph, WorkflowStorage,
};
