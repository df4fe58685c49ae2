// Workflow definitions - the graph a chat turn is executed against

//! # Workflow Graphs
//!
//! A [`Workflow`] is the metadata row a business owns; a [`WorkflowGraph`] is
//! the immutable snapshot of its nodes and edges loaded for one engine run.
//!
//! ## Graph Shape
//!
//! ```text
//! genai-intent ──▶ router ──(intent)──▶ module ──▶ module ──▶ response
//! ```
//!
//! Edge compatibility is a static table (see [`NodeType::can_connect_to`])
//! checked once by [`WorkflowGraph::validate`]. The engine relies on that and
//! only performs defensive `None` checks while walking.
//!
//! ## Rust Learning Notes:
//!
//! ### Index Maps
//! The graph keeps a `HashMap<String, usize>` from node id to position so
//! lookups are O(1) while nodes stay in their authored order, which keeps
//! iteration (and therefore routing) deterministic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::node::{Node, NodeType};

/// Workflow metadata owned by a business
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub business_id: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Workflow {
    pub fn new(id: impl Into<String>, business_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            business_id: business_id.into(),
            name: name.into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Directed connection `source → target`
///
/// `source_handle` is the branch label drawn on the canvas; for router edges
/// it names the intent the edge was created for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{}->{}", source, target),
            source,
            target,
            source_handle: None,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }
}

/// Structural problems found in a graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate node id: {node_id}")]
    DuplicateNode { node_id: String },

    #[error("Edge {edge_id} references unknown node {node_id}")]
    UnknownNode { edge_id: String, node_id: String },

    #[error("Edge {edge_id} connects {source_type} to {target_type}, which is not allowed")]
    IncompatibleEdge {
        edge_id: String,
        source_type: NodeType,
        target_type: NodeType,
    },

    #[error("Router {router_id} has no mapping for intent '{intent}'")]
    UnroutedIntent { router_id: String, intent: String },

    #[error("Router {router_id} maps intent '{intent}' to unknown node {target}")]
    DanglingRoute {
        router_id: String,
        intent: String,
        target: String,
    },

    #[error("Module chain forms a cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
}

/// Immutable node/edge snapshot used for one engine run
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    pub workflow_id: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<String, usize>,
}

impl WorkflowGraph {
    /// Build a graph; later duplicates of a node id are ignored by lookups
    /// (and reported by [`WorkflowGraph::validate`])
    pub fn new(workflow_id: impl Into<String>, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        for (position, node) in nodes.iter().enumerate() {
            index.entry(node.id.clone()).or_insert(position);
        }
        Self {
            workflow_id: workflow_id.into(),
            nodes,
            edges,
            index,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&position| &self.nodes[position])
    }

    fn has_incoming(&self, node_id: &str) -> bool {
        self.edges.iter().any(|edge| edge.target == node_id)
    }

    /// The `genai-intent` node runs start from
    ///
    /// Prefers an intent node without incoming edges; nodes are scanned in
    /// authored order so the choice is deterministic.
    pub fn entry_node(&self) -> Option<&Node> {
        let mut intent_nodes = self
            .nodes
            .iter()
            .filter(|node| node.node_type() == NodeType::GenAIIntent);
        let first = intent_nodes.clone().next();
        intent_nodes
            .find(|node| !self.has_incoming(&node.id))
            .or(first)
    }

    /// Targets of the outgoing edges of `node_id`, in edge order
    ///
    /// When `branch_label` is given only edges carrying that `source_handle`
    /// are followed.
    pub fn outgoing_edges(&self, node_id: &str, branch_label: Option<&str>) -> Vec<&Node> {
        self.edges
            .iter()
            .filter(|edge| edge.source == node_id)
            .filter(|edge| match branch_label {
                Some(label) => edge.source_handle.as_deref() == Some(label),
                None => true,
            })
            .filter_map(|edge| self.node(&edge.target))
            .collect()
    }

    /// First outgoing target of `node_id` with the given type
    pub fn next_of_type(&self, node_id: &str, node_type: NodeType) -> Option<&Node> {
        self.outgoing_edges(node_id, None)
            .into_iter()
            .find(|node| node.node_type() == node_type)
    }

    /// Resolve the module a router sends `intent` to
    ///
    /// A missing mapping is a terminal routing failure; there is no default
    /// pass-through.
    pub fn route(&self, router: &Node, intent: &str) -> Result<&Node, GraphError> {
        let target = router
            .router_config()
            .and_then(|config| config.target_for(intent))
            .ok_or_else(|| GraphError::UnroutedIntent {
                router_id: router.id.clone(),
                intent: intent.to_string(),
            })?;

        self.node(target).ok_or_else(|| GraphError::DanglingRoute {
            router_id: router.id.clone(),
            intent: intent.to_string(),
            target: target.to_string(),
        })
    }

    /// Static checks: unique ids, known endpoints, edge type compatibility,
    /// router mappings pointing at existing module nodes
    pub fn validate(&self) -> Result<(), Vec<GraphError>> {
        let mut violations = Vec::new();

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                violations.push(GraphError::DuplicateNode {
                    node_id: node.id.clone(),
                });
            }
        }

        for edge in &self.edges {
            let source = self.node(&edge.source);
            let target = self.node(&edge.target);
            for (endpoint, found) in [(&edge.source, source), (&edge.target, target)] {
                if found.is_none() {
                    violations.push(GraphError::UnknownNode {
                        edge_id: edge.id.clone(),
                        node_id: endpoint.clone(),
                    });
                }
            }
            if let (Some(source), Some(target)) = (source, target) {
                if !source.node_type().can_connect_to(target.node_type()) {
                    violations.push(GraphError::IncompatibleEdge {
                        edge_id: edge.id.clone(),
                        source_type: source.node_type(),
                        target_type: target.node_type(),
                    });
                }
            }
        }

        for router in self.nodes.iter().filter(|n| n.node_type() == NodeType::Router) {
            if let Some(config) = router.router_config() {
                for (intent, target) in &config.intent_mappings {
                    let valid = self
                        .node(target)
                        .map(|node| node.node_type() == NodeType::Module)
                        .unwrap_or(false);
                    if !valid {
                        violations.push(GraphError::DanglingRoute {
                            router_id: router.id.clone(),
                            intent: intent.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Find a cycle among `module → module` edges, if any
    ///
    /// Iterative DFS with an explicit stack; nodes are visited in authored
    /// order so the reported path is stable across runs.
    pub fn find_module_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let modules: Vec<&Node> = self
            .nodes
            .iter()
            .filter(|node| node.node_type() == NodeType::Module)
            .collect();
        let mut marks: HashMap<&str, Mark> =
            modules.iter().map(|node| (node.id.as_str(), Mark::Unvisited)).collect();

        for start in &modules {
            if marks[start.id.as_str()] != Mark::Unvisited {
                continue;
            }

            // (node id, index of next child to explore)
            let mut stack: Vec<(&str, usize)> = vec![(start.id.as_str(), 0)];
            marks.insert(start.id.as_str(), Mark::InProgress);

            while let Some((current, child_index)) = stack.last().copied() {
                let children = self.module_successors(current);
                if child_index >= children.len() {
                    marks.insert(current, Mark::Done);
                    stack.pop();
                    continue;
                }
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }

                let child = children[child_index];
                match marks.get(child).copied().unwrap_or(Mark::Done) {
                    Mark::Unvisited => {
                        marks.insert(child, Mark::InProgress);
                        stack.push((child, 0));
                    }
                    Mark::InProgress => {
                        let begin = stack.iter().position(|(id, _)| *id == child).unwrap_or(0);
                        let mut path: Vec<String> =
                            stack[begin..].iter().map(|(id, _)| id.to_string()).collect();
                        path.push(child.to_string());
                        return Some(path);
                    }
                    Mark::Done => {}
                }
            }
        }

        None
    }

    fn module_successors(&self, node_id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|edge| edge.source == node_id)
            .filter(|edge| {
                self.node(&edge.target)
                    .map(|node| node.node_type() == NodeType::Module)
                    .unwrap_or(false)
            })
            .map(|edge| edge.target.as_str())
            .collect()
    }
}

/// Portable JSON form of a workflow, used for seeding and offline validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub business_id: String,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowDocument {
    pub fn to_graph(&self, workflow_id: &str) -> WorkflowGraph {
        WorkflowGraph::new(workflow_id, self.nodes.clone(), self.edges.clone())
    }
}
