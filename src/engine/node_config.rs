//! Node configuration save path
//!
//! Everything that makes a node count as configured happens here, before the
//! engine ever sees it: required fields, the model allow-list, a live test call
//! for GenAI credentials, router targets and module API bindings. Secrets are
//! encrypted before they reach storage.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::crypto::Encryptor;
use super::storage::{NodeConfigRecord, NodeRecord, StoredGraph, WorkflowStorage};
use crate::llm::classifier::{ConfigTestResult, IntentClassifier};
use crate::models::{GenAIConfig, Intent, NodeConfig, NodeType, Workflow, WorkflowDocument};
use crate::{BlitzError, Result};

const TEST_SAMPLE_MESSAGE: &str = "Hello, can you help me with my order?";

/// Outcome of a configuration save
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedConfiguration {
    pub node_id: String,
    pub is_configured: bool,
    /// Why the node is not configured yet, when a credential test failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Validates, encrypts and persists node configurations
#[derive(Clone)]
pub struct NodeConfigService {
    storage: Arc<dyn WorkflowStorage>,
    encryptor: Arc<dyn Encryptor>,
    classifier: IntentClassifier,
}

impl NodeConfigService {
    pub fn new(storage: Arc<dyn WorkflowStorage>, encryptor: Arc<dyn Encryptor>, classifier: IntentClassifier) -> Self {
        Self {
            storage,
            encryptor,
            classifier,
        }
    }

    /// Provider credential validation (`testAPIKey`)
    pub async fn test_api_key(&self, config: &GenAIConfig) -> ConfigTestResult {
        self.classifier.test_configuration(config, TEST_SAMPLE_MESSAGE).await
    }

    /// [`save_node_configuration`](Self::save_node_configuration) on behalf of a business
    ///
    /// A workflow owned by another business is reported as `WorkflowNotFound`.
    pub async fn save_owned_node_configuration(
        &self,
        business_id: &str,
        workflow_id: &str,
        node_id: &str,
        config: NodeConfig,
    ) -> Result<SavedConfiguration> {
        let owned = self
            .storage
            .get_workflow(workflow_id)
            .await?
            .is_some_and(|workflow| workflow.business_id == business_id);
        if !owned {
            warn!(business_id, workflow_id, "Configuration save rejected for workflow outside the business");
            return Err(BlitzError::WorkflowNotFound {
                id: workflow_id.to_string(),
            });
        }
        self.save_node_configuration(workflow_id, node_id, config).await
    }

    /// Validate and store the configuration of one node
    ///
    /// ## Errors
    /// - `WorkflowNotFound` / `NodeNotFound` for unknown targets
    /// - `InvalidInput` for blank required fields, models outside the
    ///   allow-list, router targets that are not module nodes, and modules
    ///   missing a required API binding
    ///
    /// A GenAI credential that fails its test call is still saved, with
    /// `is_configured = false` and the failure reported back.
    pub async fn save_node_configuration(
        &self,
        workflow_id: &str,
        node_id: &str,
        config: NodeConfig,
    ) -> Result<SavedConfiguration> {
        self.storage
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| BlitzError::WorkflowNotFound {
                id: workflow_id.to_string(),
            })?;
        let graph = self.storage.load_graph(workflow_id).await?.unwrap_or_default();
        let record = graph
            .nodes
            .iter()
            .find(|node| node.id == node_id)
            .ok_or_else(|| BlitzError::NodeNotFound {
                workflow_id: workflow_id.to_string(),
                node_id: node_id.to_string(),
            })?;

        if record.node_type != config.node_type() {
            return Err(BlitzError::InvalidInput(format!(
                "node {} is a {} node, got {} configuration",
                node_id,
                record.node_type,
                config.node_type()
            )));
        }

        let mut config = config;
        let mut test_error = None;
        match &mut config {
            NodeConfig::GenAIIntent(genai) => {
                genai.model = genai.model.trim().to_string();
                genai.api_key = genai.api_key.trim().to_string();
                IntentClassifier::validate_config(genai).map_err(|e| BlitzError::InvalidInput(e.to_string()))?;

                let result = self.test_api_key(genai).await;
                genai.api_key_validated = result.valid;
                if !result.valid {
                    warn!(workflow_id, node_id, model = %genai.model, "GenAI credential test failed");
                    test_error = result.error;
                }
            }
            NodeConfig::Router(router) => {
                for (intent, target) in &router.intent_mappings {
                    if Intent::parse(intent).is_none() {
                        return Err(BlitzError::InvalidInput(format!("unknown intent '{}'", intent)));
                    }
                    let is_module = graph
                        .nodes
                        .iter()
                        .any(|node| &node.id == target && node.node_type == NodeType::Module);
                    if !is_module {
                        return Err(BlitzError::InvalidInput(format!(
                            "intent '{}' must route to a module node, '{}' is not one",
                            intent, target
                        )));
                    }
                }
            }
            NodeConfig::Module(module) => {
                if let Some(expected) = record.module_type {
                    if expected != module.module_type {
                        return Err(BlitzError::InvalidInput(format!(
                            "node {} is a {} module, got {} configuration",
                            node_id, expected, module.module_type
                        )));
                    }
                }
                let missing = module.missing_api_aliases();
                if !missing.is_empty() {
                    return Err(BlitzError::InvalidInput(format!(
                        "{} module is missing required API bindings: {}",
                        module.module_type,
                        missing.join(", ")
                    )));
                }
            }
            NodeConfig::Response => {}
        }

        let is_configured = config.is_configured();
        let sealed = config.map_secrets(|secret| self.encryptor.encrypt(secret))?;
        self.storage
            .save_node_config(workflow_id, NodeConfigRecord::new(node_id, sealed, is_configured))
            .await?;

        info!(workflow_id, node_id, is_configured, "Node configuration saved");
        Ok(SavedConfiguration {
            node_id: node_id.to_string(),
            is_configured,
            error: test_error,
        })
    }

    /// Store a complete workflow document as authored
    ///
    /// Used for seeding and imports: the graph is validated statically, secrets
    /// are encrypted, and `is_configured` is derived from the document without
    /// test calls.
    pub async fn import_document(&self, document: &WorkflowDocument) -> Result<Workflow> {
        let workflow_id = document
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let graph = document.to_graph(&workflow_id);
        if let Err(violations) = graph.validate() {
            let reasons: Vec<String> = violations.iter().map(ToString::to_string).collect();
            return Err(BlitzError::InvalidInput(reasons.join("; ")));
        }

        let workflow = self
            .storage
            .create_workflow(Workflow::new(&workflow_id, &document.business_id, &document.name))
            .await?;

        let stored = StoredGraph {
            nodes: document
                .nodes
                .iter()
                .map(|node| NodeRecord {
                    id: node.id.clone(),
                    node_type: node.node_type(),
                    module_type: node.module_type(),
                    label: node.label.clone(),
                })
                .collect(),
            edges: document.edges.clone(),
        };
        self.storage.save_graph(&workflow_id, stored).await?;

        for node in &document.nodes {
            if node.node_type() == NodeType::Response {
                continue;
            }
            let sealed = node.config.map_secrets(|secret| self.encryptor.encrypt(secret))?;
            self.storage
                .save_node_config(&workflow_id, NodeConfigRecord::new(&node.id, sealed, node.is_configured()))
                .await?;
        }

        info!(workflow_id = %workflow.id, business_id = %workflow.business_id, "Workflow imported");
        Ok(workflow)
    }
}
