// Workflow Execution Engine
// Walks a workflow graph for one inbound chat message

//! # Workflow Execution Engine
//!
//! One chat message triggers exactly one walk of the graph:
//!
//! ```text
//! Init → Classifying → Routing → ModuleExecuting ⟲ → Responding → Done
//!                                                         └──▶ Failed (from any state)
//! ```
//!
//! - **Init**: find the `genai-intent` entry node and reject module cycles
//!   before anything runs
//! - **Classifying**: ask the classifier for the intent
//! - **Routing**: follow the router's explicit intent mapping; a missing
//!   mapping is terminal, never a pass-through
//! - **ModuleExecuting**: run module executors, following `module → module`
//!   hand-offs up to the hop budget
//! - **Responding**: pick the live payload and who authored it
//!
//! Every failure is attributed to the node that raised it, and the path walked
//! so far is kept so a failed run can be traced hop by hop.
//!
//! ## Determinism
//! The walk has no randomness: routing is a map lookup on the intent, and
//! downstream nodes are chosen in edge order. For a fixed graph and intent the
//! visited path is always the same.
//!
//! ## Rust Learning Notes:
//!
//! ### Accumulator Struct
//! `RunState` owns everything that changes during a walk. Early returns consume
//! it through `fail`, so a run can never report success after recording a
//! fatal error.

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::formatter::{FormattedResponse, ResponseFormatter};
use super::modules::{ModuleInput, ModuleRegistry};
use crate::llm::classifier::IntentClassifier;
use crate::models::{
    CommunicationMethod, ExecutionContext, ExecutionError, ExecutionErrorKind, ExecutionResult, ExecutionState,
    Intent, Node, NodeType, Payload, WorkflowGraph,
};

/// Default bound on module hops per run
pub const DEFAULT_MAX_HOPS: usize = 16;

/// Engine tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of module executions in one run
    pub max_hops: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
        }
    }
}

struct RunState<'a> {
    context: &'a ExecutionContext,
    state: ExecutionState,
    path: Vec<String>,
    errors: Vec<ExecutionError>,
    intent: Option<Intent>,
    extracted_data: Option<Value>,
    payload: Option<Payload>,
    method: CommunicationMethod,
}

impl<'a> RunState<'a> {
    fn new(context: &'a ExecutionContext) -> Self {
        Self {
            context,
            state: ExecutionState::Init,
            path: Vec::new(),
            errors: Vec::new(),
            intent: None,
            extracted_data: None,
            payload: None,
            method: CommunicationMethod::FrontendToBlitz,
        }
    }

    fn enter(&mut self, state: ExecutionState) {
        debug!(from = ?self.state, to = ?state, "State transition");
        self.state = state;
    }

    fn visit(&mut self, node: &Node) {
        debug!(node_id = %node.id, node_type = %node.node_type(), "Visiting node");
        self.path.push(node.id.clone());
    }

    /// Merge object fields; anything else replaces the current data
    fn merge_data(&mut self, data: Value) {
        match (&mut self.extracted_data, data) {
            (Some(Value::Object(current)), Value::Object(incoming)) => current.extend(incoming),
            (slot, incoming) => *slot = Some(incoming),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        (Utc::now() - self.context.started_at).num_milliseconds().max(0) as u64
    }

    fn into_result(self, success: bool) -> ExecutionResult {
        let total_execution_time = self.elapsed_ms();
        ExecutionResult {
            execution_id: self.context.execution_id,
            workflow_id: self.context.workflow_id.clone(),
            success,
            state: self.state,
            method: if success {
                self.method
            } else {
                CommunicationMethod::FrontendToBlitz
            },
            intent: self.intent,
            response: if success { self.payload } else { None },
            extracted_data: self.extracted_data,
            execution_path: self.path,
            total_execution_time,
            errors: self.errors,
        }
    }

    fn fail(mut self, error: ExecutionError) -> ExecutionResult {
        warn!(
            code = %error.code,
            node_id = error.node_id.as_deref().unwrap_or("-"),
            from = ?self.state,
            "Workflow execution failed: {}",
            error.message
        );
        self.errors.push(error);
        self.state = ExecutionState::Failed;
        self.into_result(false)
    }

    fn finish(mut self) -> ExecutionResult {
        self.state = ExecutionState::Done;
        let result = self.into_result(true);
        info!(
            intent = ?result.intent,
            path = ?result.execution_path,
            elapsed_ms = result.total_execution_time,
            "Workflow execution completed"
        );
        result
    }
}

/// Orchestrates one graph walk per chat message
#[derive(Clone)]
pub struct WorkflowExecutionEngine {
    classifier: IntentClassifier,
    modules: ModuleRegistry,
    formatter: ResponseFormatter,
    config: EngineConfig,
}

impl WorkflowExecutionEngine {
    pub fn new(classifier: IntentClassifier, modules: ModuleRegistry, config: EngineConfig) -> Self {
        Self {
            classifier,
            modules,
            formatter: ResponseFormatter,
            config,
        }
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    /// Envelope for the payload of a successful run
    pub fn format_response(&self, result: &ExecutionResult) -> Option<FormattedResponse> {
        result
            .response
            .as_ref()
            .map(|payload| self.formatter.format(payload, result.method))
    }

    /// Walk `graph` for the message in `context`
    ///
    /// Never returns an error: failures end up in the result with
    /// `success = false` and the offending node attributed.
    #[tracing::instrument(
        name = "workflow_execution",
        skip_all,
        fields(execution_id = %context.execution_id, workflow_id = %graph.workflow_id)
    )]
    pub async fn execute(&self, graph: &WorkflowGraph, context: &ExecutionContext) -> ExecutionResult {
        let mut run = RunState::new(context);

        // Init
        let Some(entry) = graph.entry_node() else {
            return run.fail(ExecutionError::new(
                ExecutionErrorKind::MissingEntryNode,
                "Workflow has no genai-intent entry node",
            ));
        };
        if let Some(cycle) = graph.find_module_cycle() {
            let message = format!("Module chain forms a cycle: {}", cycle.join(" -> "));
            return run.fail(
                ExecutionError::new(ExecutionErrorKind::GraphCycle, message).with_details(json!({ "cycle": cycle })),
            );
        }

        // Classifying
        run.enter(ExecutionState::Classifying);
        run.visit(entry);
        let Some(genai) = entry.genai_config() else {
            return run.fail(
                ExecutionError::new(ExecutionErrorKind::Configuration, "Entry node has no GenAI configuration")
                    .at_node(&entry.id),
            );
        };
        let classification = match self.classifier.classify(&context.history, &context.message, genai).await {
            Ok(classification) => classification,
            Err(err) => {
                return run.fail(ExecutionError::new(err.kind(), err.to_string()).at_node(&entry.id));
            }
        };
        run.intent = Some(classification.intent);
        if let Some(data) = classification.data.clone() {
            run.merge_data(data);
        }

        // Routing
        run.enter(ExecutionState::Routing);
        let Some(router) = graph.next_of_type(&entry.id, NodeType::Router) else {
            return run.fail(
                ExecutionError::new(
                    ExecutionErrorKind::UnroutedIntent,
                    format!("Intent node {} is not connected to a router", entry.id),
                )
                .at_node(&entry.id),
            );
        };
        run.visit(router);
        let mut current = match graph.route(router, classification.intent.as_str()) {
            Ok(target) => target,
            Err(err) => {
                return run.fail(
                    ExecutionError::new(ExecutionErrorKind::UnroutedIntent, err.to_string())
                        .at_node(&router.id)
                        .with_details(json!({ "intent": classification.intent })),
                );
            }
        };

        // ModuleExecuting
        let mut hops = 0usize;
        let response_node = loop {
            hops += 1;
            if hops > self.config.max_hops {
                return run.fail(
                    ExecutionError::new(
                        ExecutionErrorKind::GraphCycle,
                        format!("Module chain exceeded {} hops", self.config.max_hops),
                    )
                    .at_node(&current.id),
                );
            }

            run.enter(ExecutionState::ModuleExecuting);
            run.visit(current);

            let Some(module_config) = current.module_config() else {
                return run.fail(
                    ExecutionError::new(
                        ExecutionErrorKind::Execution,
                        format!("Node {} is a {} node, expected a module", current.id, current.node_type()),
                    )
                    .at_node(&current.id),
                );
            };
            let Some(executor) = self.modules.get(module_config.module_type) else {
                return run.fail(
                    ExecutionError::new(
                        ExecutionErrorKind::Configuration,
                        format!("No executor registered for {} modules", module_config.module_type),
                    )
                    .at_node(&current.id),
                );
            };

            let input = ModuleInput {
                node_id: &current.id,
                intent: classification.intent,
                context,
                config: module_config,
                classification: &classification,
                extracted_data: run.extracted_data.as_ref(),
                upstream: run.payload.as_ref(),
            };
            let outcome = match executor.execute(input).await {
                Ok(outcome) => outcome,
                Err(failure) => return run.fail(failure.into_execution_error(&current.id)),
            };

            if let Some(recovered) = outcome.recovered_error {
                run.errors.push(recovered);
            }
            if let Some(data) = outcome.extracted_data {
                run.merge_data(data);
            }
            if let Some(payload) = outcome.payload {
                run.payload = Some(payload);
                run.method = outcome.method;
            }

            if outcome.is_final {
                break graph.next_of_type(&current.id, NodeType::Response);
            }

            let downstream = graph.outgoing_edges(&current.id, None);
            let next = match outcome.next_node_id.as_deref() {
                Some(requested) => downstream.into_iter().find(|node| node.id == requested),
                None => downstream.into_iter().next(),
            };
            match next {
                Some(node) if node.node_type() == NodeType::Module => current = node,
                Some(node) if node.node_type() == NodeType::Response => break Some(node),
                _ => {
                    return run.fail(
                        ExecutionError::new(
                            ExecutionErrorKind::Execution,
                            format!("Module {} handed off but has no downstream node to continue with", current.id),
                        )
                        .at_node(&current.id),
                    );
                }
            }
        };

        // Responding
        run.enter(ExecutionState::Responding);
        if let Some(node) = response_node {
            run.visit(node);
        }
        if run.payload.is_none() {
            let node_id = run.path.last().cloned().unwrap_or_default();
            return run.fail(
                ExecutionError::new(ExecutionErrorKind::Execution, "No module produced a response").at_node(node_id),
            );
        }

        run.finish()
    }
}
