// Collaborator interfaces for workflows, chat sessions and accounts

//! # Storage Collaborators
//!
//! The engine never talks to a database directly. Everything it persists or
//! reads goes through three async traits:
//!
//! - [`WorkflowStorage`]: workflow rows, the node/edge graph, and per-node
//!   configuration rows (secret fields stored encrypted)
//! - [`ChatStorage`]: chat sessions and their ordered message history
//! - [`IdentityProvider`]: resolves an authenticated identity to its user and
//!   business records
//!
//! Each trait ships with an in-memory implementation for development, the demo
//! server and tests. A relational backend only has to implement the traits.
//!
//! ## Rust Learning Notes:
//!
//! ### Async Traits
//! `async fn` in a trait object needs boxing; `#[async_trait]` rewrites each
//! method to return `Pin<Box<dyn Future + Send>>` so the traits can be used as
//! `Arc<dyn WorkflowStorage>`.
//!
//! ### tokio::sync::RwLock vs DashMap
//! The workflow store keeps several maps that must change together, so it uses
//! one async `RwLock` around a state struct. Chat sessions are independent
//! entries, so a sharded `DashMap` lets concurrent chats proceed without
//! contending on one lock.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    BusinessAccount, BusinessRecord, ChatMessage, ChatRole, ChatSession, Edge, Identity, Intent,
    ModuleType, NodeConfig, NodeType, UserRecord, Workflow,
};
use crate::{BlitzError, Result};

/// Structural node row: id and kind, no configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_type: Option<ModuleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Configuration row attached to one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfigRecord {
    pub node_id: String,
    /// Secret fields are ciphertext
    pub config: NodeConfig,
    pub is_configured: bool,
    pub updated_at: DateTime<Utc>,
}

impl NodeConfigRecord {
    pub fn new(node_id: impl Into<String>, config: NodeConfig, is_configured: bool) -> Self {
        Self {
            node_id: node_id.into(),
            config,
            is_configured,
            updated_at: Utc::now(),
        }
    }
}

/// Node and edge rows of one workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredGraph {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<Edge>,
}

/// Workflow persistence collaborator
#[async_trait::async_trait]
pub trait WorkflowStorage: Send + Sync {
    async fn create_workflow(&self, workflow: Workflow) -> Result<Workflow>;

    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>>;

    /// Workflows owned by `business_id`, newest first
    async fn list_workflows_for_business(&self, business_id: &str) -> Result<Vec<Workflow>>;

    /// Replace the node/edge rows of a workflow
    ///
    /// ## Errors
    /// - `WorkflowNotFound` if the workflow row does not exist
    async fn save_graph(&self, workflow_id: &str, graph: StoredGraph) -> Result<()>;

    async fn load_graph(&self, workflow_id: &str) -> Result<Option<StoredGraph>>;

    async fn get_node_config(&self, workflow_id: &str, node_id: &str) -> Result<Option<NodeConfigRecord>>;

    /// Insert or replace the configuration row of a node
    async fn save_node_config(&self, workflow_id: &str, record: NodeConfigRecord) -> Result<NodeConfigRecord>;

    async fn list_node_configs(&self, workflow_id: &str) -> Result<Vec<NodeConfigRecord>>;
}

/// Chat persistence collaborator
#[async_trait::async_trait]
pub trait ChatStorage: Send + Sync {
    async fn get_or_create_chat_session(&self, user_id: &str, business_id: &str) -> Result<ChatSession>;

    /// Messages of a session, oldest first
    async fn get_chat_history(&self, session_id: Uuid) -> Result<Vec<ChatMessage>>;

    async fn save_chat_message(
        &self,
        session_id: Uuid,
        role: ChatRole,
        content: &str,
        intent: Option<Intent>,
        extracted_data: Option<Value>,
    ) -> Result<ChatMessage>;
}

/// Identity/business resolution collaborator
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the caller's user and business, creating the business on first use
    async fn ensure_business_for_user(&self, identity: &Identity) -> Result<BusinessAccount>;
}

#[derive(Default)]
struct WorkflowState {
    /// Insertion sequence breaks ties between equal `created_at` values
    workflows: HashMap<String, (u64, Workflow)>,
    graphs: HashMap<String, StoredGraph>,
    /// workflow id → node id → configuration row
    configs: HashMap<String, HashMap<String, NodeConfigRecord>>,
    next_sequence: u64,
}

/// In-memory [`WorkflowStorage`]
#[derive(Default)]
pub struct InMemoryWorkflowStorage {
    state: RwLock<WorkflowState>,
}

impl InMemoryWorkflowStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl WorkflowStorage for InMemoryWorkflowStorage {
    async fn create_workflow(&self, workflow: Workflow) -> Result<Workflow> {
        let mut state = self.state.write().await;
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.workflows.insert(workflow.id.clone(), (sequence, workflow.clone()));
        Ok(workflow)
    }

    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>> {
        let state = self.state.read().await;
        Ok(state.workflows.get(id).map(|(_, workflow)| workflow.clone()))
    }

    async fn list_workflows_for_business(&self, business_id: &str) -> Result<Vec<Workflow>> {
        let state = self.state.read().await;
        let mut matching: Vec<&(u64, Workflow)> = state
            .workflows
            .values()
            .filter(|(_, workflow)| workflow.business_id == business_id)
            .collect();
        matching.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then_with(|| seq_b.cmp(seq_a))
        });
        Ok(matching.into_iter().map(|(_, workflow)| workflow.clone()).collect())
    }

    async fn save_graph(&self, workflow_id: &str, graph: StoredGraph) -> Result<()> {
        let mut state = self.state.write().await;
        let (_, workflow) = state
            .workflows
            .get_mut(workflow_id)
            .ok_or_else(|| BlitzError::WorkflowNotFound {
                id: workflow_id.to_string(),
            })?;
        workflow.updated_at = Utc::now();
        state.graphs.insert(workflow_id.to_string(), graph);
        Ok(())
    }

    async fn load_graph(&self, workflow_id: &str) -> Result<Option<StoredGraph>> {
        let state = self.state.read().await;
        Ok(state.graphs.get(workflow_id).cloned())
    }

    async fn get_node_config(&self, workflow_id: &str, node_id: &str) -> Result<Option<NodeConfigRecord>> {
        let state = self.state.read().await;
        Ok(state
            .configs
            .get(workflow_id)
            .and_then(|configs| configs.get(node_id))
            .cloned())
    }

    async fn save_node_config(&self, workflow_id: &str, record: NodeConfigRecord) -> Result<NodeConfigRecord> {
        let mut state = self.state.write().await;
        if !state.workflows.contains_key(workflow_id) {
            return Err(BlitzError::WorkflowNotFound {
                id: workflow_id.to_string(),
            });
        }
        state
            .configs
            .entry(workflow_id.to_string())
            .or_default()
            .insert(record.node_id.clone(), record.clone());
        Ok(record)
    }

    async fn list_node_configs(&self, workflow_id: &str) -> Result<Vec<NodeConfigRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<NodeConfigRecord> = state
            .configs
            .get(workflow_id)
            .map(|configs| configs.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        Ok(records)
    }
}

/// In-memory [`ChatStorage`]
#[derive(Default)]
pub struct InMemoryChatStorage {
    /// (user id, business id) → session
    sessions: DashMap<(String, String), ChatSession>,
    messages: DashMap<Uuid, Vec<ChatMessage>>,
}

impl InMemoryChatStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions, used by diagnostics and tests
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait::async_trait]
impl ChatStorage for InMemoryChatStorage {
    async fn get_or_create_chat_session(&self, user_id: &str, business_id: &str) -> Result<ChatSession> {
        let session = self
            .sessions
            .entry((user_id.to_string(), business_id.to_string()))
            .or_insert_with(|| ChatSession::new(user_id, business_id))
            .value()
            .clone();
        Ok(session)
    }

    async fn get_chat_history(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
        Ok(self
            .messages
            .get(&session_id)
            .map(|messages| messages.value().clone())
            .unwrap_or_default())
    }

    async fn save_chat_message(
        &self,
        session_id: Uuid,
        role: ChatRole,
        content: &str,
        intent: Option<Intent>,
        extracted_data: Option<Value>,
    ) -> Result<ChatMessage> {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            role,
            content: content.to_string(),
            intent,
            extracted_data,
            created_at: Utc::now(),
        };
        self.messages.entry(session_id).or_default().push(message.clone());

        if let Some(mut session) = self.sessions.iter_mut().find(|s| s.id == session_id) {
            session.updated_at = message.created_at;
        }
        Ok(message)
    }
}

/// In-memory [`IdentityProvider`]
///
/// Users get a business on first use unless one was registered up front.
#[derive(Default)]
pub struct InMemoryIdentityProvider {
    accounts: DashMap<String, BusinessAccount>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register the business a user owns
    pub fn with_business(self, user_id: &str, business_id: &str, name: &str) -> Self {
        self.accounts.insert(
            user_id.to_string(),
            BusinessAccount {
                user: UserRecord {
                    id: user_id.to_string(),
                    email: None,
                },
                business: BusinessRecord {
                    id: business_id.to_string(),
                    owner_id: user_id.to_string(),
                    name: name.to_string(),
                },
            },
        );
        self
    }
}

#[async_trait::async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn ensure_business_for_user(&self, identity: &Identity) -> Result<BusinessAccount> {
        if identity.user_id.trim().is_empty() {
            return Err(BlitzError::Unauthorized("empty user id".to_string()));
        }

        let account = self
            .accounts
            .entry(identity.user_id.clone())
            .or_insert_with(|| BusinessAccount {
                user: UserRecord {
                    id: identity.user_id.clone(),
                    email: identity.email.clone(),
                },
                business: BusinessRecord {
                    id: Uuid::new_v4().to_string(),
                    owner_id: identity.user_id.clone(),
                    name: format!("{}'s business", identity.user_id),
                },
            })
            .value()
            .clone();
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RouterConfig;
    use chrono::Duration;

    #[tokio::test]
    async fn test_workflows_listed_newest_first() {
        let storage = InMemoryWorkflowStorage::new();
        let mut older = Workflow::new("wf-old", "biz-1", "Old");
        older.created_at = Utc::now() - Duration::hours(1);
        storage.create_workflow(older).await.unwrap();
        storage.create_workflow(Workflow::new("wf-new", "biz-1", "New")).await.unwrap();
        storage.create_workflow(Workflow::new("wf-other", "biz-2", "Other")).await.unwrap();

        let listed = storage.list_workflows_for_business("biz-1").await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["wf-new", "wf-old"]);
    }

    #[tokio::test]
    async fn test_config_rows_require_existing_workflow() {
        let storage = InMemoryWorkflowStorage::new();
        let record = NodeConfigRecord::new("router", NodeConfig::Router(RouterConfig::default()), false);
        let err = storage.save_node_config("missing", record.clone()).await.unwrap_err();
        assert!(matches!(err, BlitzError::WorkflowNotFound { .. }));

        storage.create_workflow(Workflow::new("wf", "biz", "Support")).await.unwrap();
        storage.save_node_config("wf", record).await.unwrap();
        assert!(storage.get_node_config("wf", "router").await.unwrap().is_some());
        assert!(storage.get_node_config("wf", "intent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_chat_history_is_ordered_per_session() {
        let storage = InMemoryChatStorage::new();
        let session = storage.get_or_create_chat_session("u1", "b1").await.unwrap();
        let same = storage.get_or_create_chat_session("u1", "b1").await.unwrap();
        assert_eq!(session.id, same.id);

        storage
            .save_chat_message(session.id, ChatRole::User, "hi", None, None)
            .await
            .unwrap();
        storage
            .save_chat_message(session.id, ChatRole::Assistant, "hello", Some(Intent::GeneralQuery), None)
            .await
            .unwrap();

        let history = storage.get_chat_history(session.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[1].intent, Some(Intent::GeneralQuery));
        assert!(storage.get_chat_history(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_business_created_once_per_user() {
        let identities = InMemoryIdentityProvider::new().with_business("owner", "biz-1", "Shop");
        let account = identities.ensure_business_for_user(&Identity::new("owner")).await.unwrap();
        assert_eq!(account.business.id, "biz-1");

        let first = identities.ensure_business_for_user(&Identity::new("new-user")).await.unwrap();
        let second = identities.ensure_business_for_user(&Identity::new("new-user")).await.unwrap();
        assert_eq!(first.business.id, second.business.id);
    }
}
