//! Node Configuration Resolver
//!
//! Loads a workflow's node/edge rows, attaches each node's configuration row
//! and decrypts secret fields, producing the immutable [`WorkflowGraph`] one
//! engine run works against. Read-only: nothing is written back.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::crypto::Decryptor;
use super::storage::WorkflowStorage;
use crate::models::{ExecutionErrorKind, GraphError, Node, NodeConfig, NodeType, WorkflowGraph};
use crate::BlitzError;

/// Failures while loading a workflow for execution
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("Workflow not found: {workflow_id}")]
    WorkflowNotFound { workflow_id: String },

    #[error("Node {node_id} has no configuration")]
    MissingConfiguration { node_id: String },

    #[error("Node {node_id} is a {expected} node but its configuration is for {found}")]
    TypeMismatch {
        node_id: String,
        expected: String,
        found: String,
    },

    /// Carries the node id only; never ciphertext or partial plaintext
    #[error("Failed to decrypt credentials of node {node_id}")]
    Decryption { node_id: String },

    #[error("Workflow graph is invalid: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    InvalidGraph(Vec<GraphError>),

    #[error("Storage error: {0}")]
    Storage(#[from] BlitzError),
}

impl ConfigLoadError {
    pub fn kind(&self) -> ExecutionErrorKind {
        ExecutionErrorKind::ConfigLoad
    }

    pub fn node_id(&self) -> Option<&str> {
        match self {
            ConfigLoadError::MissingConfiguration { node_id }
            | ConfigLoadError::TypeMismatch { node_id, .. }
            | ConfigLoadError::Decryption { node_id } => Some(node_id),
            _ => None,
        }
    }
}

/// Loads workflows with decrypted node configurations
#[derive(Clone)]
pub struct ConfigResolver {
    storage: Arc<dyn WorkflowStorage>,
    decryptor: Arc<dyn Decryptor>,
}

impl ConfigResolver {
    pub fn new(storage: Arc<dyn WorkflowStorage>, decryptor: Arc<dyn Decryptor>) -> Self {
        Self { storage, decryptor }
    }

    /// Load the graph of `workflow_id` with every configuration attached
    ///
    /// Response nodes need no configuration row; every other node does.
    pub async fn load_workflow_with_configurations(&self, workflow_id: &str) -> Result<WorkflowGraph, ConfigLoadError> {
        let not_found = || ConfigLoadError::WorkflowNotFound {
            workflow_id: workflow_id.to_string(),
        };

        self.storage.get_workflow(workflow_id).await?.ok_or_else(not_found)?;
        let stored = self.storage.load_graph(workflow_id).await?.ok_or_else(not_found)?;

        let mut nodes = Vec::with_capacity(stored.nodes.len());
        for record in stored.nodes {
            let config = match self.storage.get_node_config(workflow_id, &record.id).await? {
                Some(row) => row.config,
                None if record.node_type == NodeType::Response => NodeConfig::Response,
                None => {
                    return Err(ConfigLoadError::MissingConfiguration { node_id: record.id });
                }
            };

            let mismatched_module = match (&config, record.module_type) {
                (NodeConfig::Module(module), Some(expected)) => module.module_type != expected,
                _ => false,
            };
            if config.node_type() != record.node_type || mismatched_module {
                return Err(ConfigLoadError::TypeMismatch {
                    node_id: record.id,
                    expected: record.node_type.to_string(),
                    found: config.node_type().to_string(),
                });
            }

            let decrypted = config
                .map_secrets(|ciphertext| self.decryptor.decrypt(ciphertext))
                .map_err(|_| {
                    warn!(workflow_id, node_id = %record.id, "Credential decryption failed");
                    ConfigLoadError::Decryption {
                        node_id: record.id.clone(),
                    }
                })?;

            nodes.push(Node {
                id: record.id,
                label: record.label,
                config: decrypted,
            });
        }

        let graph = WorkflowGraph::new(workflow_id, nodes, stored.edges);
        graph.validate().map_err(ConfigLoadError::InvalidGraph)?;

        debug!(
            workflow_id,
            nodes = graph.nodes().len(),
            edges = graph.edges().len(),
            "Workflow loaded"
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::crypto::{AesGcmDecryptor, Encryptor, PlaintextDecryptor};
    use crate::engine::storage::{InMemoryWorkflowStorage, NodeConfigRecord, NodeRecord, StoredGraph};
    use crate::models::{Edge, GenAIConfig, ModuleConfig, ModuleType, RouterConfig, Workflow};

    fn record(id: &str, node_type: NodeType, module_type: Option<ModuleType>) -> NodeRecord {
        NodeRecord {
            id: id.to_string(),
            node_type,
            module_type,
            label: None,
        }
    }

    async fn seeded_storage(api_key: &str) -> Arc<InMemoryWorkflowStorage> {
        let storage = Arc::new(InMemoryWorkflowStorage::new());
        storage.create_workflow(Workflow::new("wf", "biz", "Support")).await.unwrap();
        storage
            .save_graph(
                "wf",
                StoredGraph {
                    nodes: vec![
                        record("intent", NodeType::GenAIIntent, None),
                        record("router", NodeType::Router, None),
                        record("faq", NodeType::Module, Some(ModuleType::Faq)),
                        record("reply", NodeType::Response, None),
                    ],
                    edges: vec![
                        Edge::new("intent", "router"),
                        Edge::new("router", "faq"),
                        Edge::new("faq", "reply"),
                    ],
                },
            )
            .await
            .unwrap();

        let mut genai = GenAIConfig::new("gemini-pro", api_key);
        genai.api_key_validated = true;
        for (node_id, config) in [
            ("intent", NodeConfig::GenAIIntent(genai)),
            ("router", NodeConfig::Router(RouterConfig::default().with_mapping("general_query", "faq"))),
            ("faq", NodeConfig::Module(ModuleConfig::new(ModuleType::Faq))),
        ] {
            storage
                .save_node_config("wf", NodeConfigRecord::new(node_id, config, true))
                .await
                .unwrap();
        }
        storage
    }

    #[tokio::test]
    async fn test_loads_graph_and_decrypts_secrets() {
        let cipher = Arc::new(AesGcmDecryptor::from_base64_key(&AesGcmDecryptor::generate_key().unwrap()).unwrap());
        let sealed = cipher.encrypt("AIza-real-key").unwrap();
        let storage = seeded_storage(&sealed).await;

        let resolver = ConfigResolver::new(storage.clone(), cipher);
        let graph = resolver.load_workflow_with_configurations("wf").await.unwrap();

        assert_eq!(graph.nodes().len(), 4);
        let intent = graph.node("intent").unwrap().genai_config().unwrap();
        assert_eq!(intent.api_key, "AIza-real-key");

        // canonical row is untouched
        let stored = storage.get_node_config("wf", "intent").await.unwrap().unwrap();
        match stored.config {
            NodeConfig::GenAIIntent(config) => assert_eq!(config.api_key, sealed),
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_workflow() {
        let resolver = ConfigResolver::new(Arc::new(InMemoryWorkflowStorage::new()), Arc::new(PlaintextDecryptor));
        let err = resolver.load_workflow_with_configurations("nope").await.unwrap_err();
        assert!(matches!(err, ConfigLoadError::WorkflowNotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_configuration_row_names_the_node() {
        let storage = seeded_storage("key").await;
        let mut graph = storage.load_graph("wf").await.unwrap().unwrap();
        graph.nodes.push(record("refund", NodeType::Module, Some(ModuleType::Refund)));
        storage.save_graph("wf", graph).await.unwrap();

        let resolver = ConfigResolver::new(storage, Arc::new(PlaintextDecryptor));
        let err = resolver.load_workflow_with_configurations("wf").await.unwrap_err();
        assert_eq!(err.node_id(), Some("refund"));
        assert_eq!(err.kind(), ExecutionErrorKind::ConfigLoad);
    }

    #[tokio::test]
    async fn test_decryption_failure_does_not_leak_ciphertext() {
        let storage = seeded_storage("definitely-not-ciphertext").await;
        let cipher = Arc::new(AesGcmDecryptor::from_base64_key(&AesGcmDecryptor::generate_key().unwrap()).unwrap());

        let resolver = ConfigResolver::new(storage, cipher);
        let err = resolver.load_workflow_with_configurations("wf").await.unwrap_err();
        assert!(matches!(err, ConfigLoadError::Decryption { ref node_id } if node_id == "intent"));
        assert!(!err.to_string().contains("definitely-not-ciphertext"));
    }

    #[tokio::test]
    async fn test_incompatible_edge_is_rejected() {
        let storage = seeded_storage("key").await;
        let mut graph = storage.load_graph("wf").await.unwrap().unwrap();
        graph.edges.push(Edge::new("intent", "faq"));
        storage.save_graph("wf", graph).await.unwrap();

        let resolver = ConfigResolver::new(storage, Arc::new(PlaintextDecryptor));
        let err = resolver.load_workflow_with_configurations("wf").await.unwrap_err();
        match err {
            ConfigLoadError::InvalidGraph(violations) => {
                assert!(matches!(violations[0], GraphError::IncompatibleEdge { .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
