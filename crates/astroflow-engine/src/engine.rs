use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use astroflow_core::error::{AstroflowError, Result};

use crate::actions::{NodeAction, SimulatedActions};
use crate::condition::first_match;
use crate::environment::{VariableEnvironment, CURRENT_ITEM};
use crate::graph::{Graph, LoopConfig, NodeKind, HANDLE_BODY, HANDLE_FALSE, HANDLE_NEXT, HANDLE_TRUE};

/// Pull-based traversal driver.
///
/// Given the current node, the engine computes the next one according to the
/// node kind and applies node actions. It owns the variable environment and
/// the per-loop iteration counters of one run; the graph itself is read-only.
pub struct ExecutionEngine {
    graph: Arc<Graph>,
    actions: Arc<dyn NodeAction>,
    initial_variables: VariableEnvironment,
    variables: VariableEnvironment,
    loop_counters: HashMap<String, u32>,
}

impl ExecutionEngine {
    /// Create an engine with simulated device actions and an empty environment.
    pub fn new(graph: Arc<Graph>) -> Self {
        Self::with_actions(graph, Arc::new(SimulatedActions::new()))
    }

    pub fn with_actions(graph: Arc<Graph>, actions: Arc<dyn NodeAction>) -> Self {
        Self {
            graph,
            actions,
            initial_variables: VariableEnvironment::new(),
            variables: VariableEnvironment::new(),
            loop_counters: HashMap::new(),
        }
    }

    /// Seed the environment. The seed is restored on every [`reset`](Self::reset).
    pub fn with_variables(mut self, variables: VariableEnvironment) -> Self {
        self.initial_variables = variables.clone();
        self.variables = variables;
        self
    }

    pub fn variables(&self) -> &VariableEnvironment {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableEnvironment {
        &mut self.variables
    }

    /// Iterations scheduled so far for a Count or ForEach loop node.
    pub fn loop_counter(&self, loop_id: &str) -> u32 {
        self.loop_counters.get(loop_id).copied().unwrap_or(0)
    }

    /// Compute the successor of `current`.
    ///
    /// `None` as input means "not started" and yields the Start node; a graph
    /// without one is a configuration error. Every other dead end (unknown
    /// node, missing handle, exhausted loop without exit) is `Ok(None)`.
    ///
    /// Loop nodes advance their counters and ForEach loops bind `current`, so
    /// repeated calls are deterministic only while the counters are unchanged.
    pub fn get_next_node(&mut self, current: Option<&str>) -> Result<Option<String>> {
        let Some(current_id) = current else {
            return match self.graph.start_node() {
                Some(start) => Ok(Some(start.id.clone())),
                None => Err(AstroflowError::WorkflowConfig(
                    "workflow has no start node".to_string(),
                )),
            };
        };

        let graph = Arc::clone(&self.graph);
        let Some(node) = graph.find_node(current_id) else {
            debug!(node_id = %current_id, "Current node not in workflow, traversal ends");
            return Ok(None);
        };

        let next = match &node.kind {
            NodeKind::Branch { conditions } => {
                let matched = first_match(&self.variables, conditions);
                let handle = if matched.is_some() { HANDLE_TRUE } else { HANDLE_FALSE };
                debug!(node_id = %current_id, ?matched, handle, "Branch evaluated");
                self.follow(current_id, handle)
            }
            NodeKind::Loop { loop_config } => self.next_from_loop(current_id, loop_config.as_ref()),
            _ => {
                let outgoing = graph.outgoing_edges(current_id);
                if outgoing.len() > 1 {
                    debug!(
                        node_id = %current_id,
                        edges = outgoing.len(),
                        "Multiple outgoing edges, taking the first"
                    );
                }
                outgoing.first().map(|e| e.target.clone())
            }
        };

        if next.is_none() {
            debug!(node_id = %current_id, "No successor, traversal ends");
        }
        Ok(next)
    }

    /// Apply the visit side effect of `node_id`. Unknown ids are ignored.
    pub fn execute_node_action(&mut self, node_id: &str) -> Result<()> {
        let graph = Arc::clone(&self.graph);
        match graph.find_node(node_id) {
            Some(node) => self.actions.execute(node, &mut self.variables),
            None => Ok(()),
        }
    }

    /// One traversal step: find the successor of `current` and visit it.
    pub fn advance(&mut self, current: Option<&str>) -> Result<Option<String>> {
        let next = self.get_next_node(current)?;
        if let Some(ref node_id) = next {
            self.execute_node_action(node_id)?;
        }
        Ok(next)
    }

    /// Restore the seeded environment and clear all loop counters.
    pub fn reset(&mut self) {
        self.variables = self.initial_variables.clone();
        self.loop_counters.clear();
    }

    fn next_from_loop(&mut self, loop_id: &str, config: Option<&LoopConfig>) -> Option<String> {
        let Some(config) = config else {
            return self.follow(loop_id, HANDLE_NEXT);
        };
        let counter = self.loop_counter(loop_id);

        let enter_body = match config {
            LoopConfig::Count { .. } => {
                let limit = config.iteration_limit().unwrap_or(1);
                if counter < limit {
                    self.loop_counters.insert(loop_id.to_string(), counter + 1);
                    true
                } else {
                    false
                }
            }
            LoopConfig::While { condition } => condition
                .as_ref()
                .is_some_and(|c| crate::condition::evaluate(&self.variables, c)),
            LoopConfig::ForEach { collection } => {
                let item = match self.variables.get(collection) {
                    Some(Value::Array(items)) => items.get(counter as usize).cloned(),
                    _ => None,
                };
                match item {
                    Some(item) => {
                        self.loop_counters.insert(loop_id.to_string(), counter + 1);
                        // Only scalars and arrays are bound; other items leave `current` as it was.
                        if is_bindable(&item) {
                            self.variables.set(CURRENT_ITEM, item);
                        }
                        true
                    }
                    None => false,
                }
            }
        };

        debug!(
            node_id = %loop_id,
            iteration = self.loop_counter(loop_id),
            enter_body,
            "Loop evaluated"
        );

        if enter_body {
            self.follow(loop_id, HANDLE_BODY)
        } else {
            self.follow(loop_id, HANDLE_NEXT)
        }
    }

    fn follow(&self, node_id: &str, handle: &str) -> Option<String> {
        self.graph
            .outgoing_edge(node_id, handle)
            .map(|e| e.target.clone())
    }
}

fn is_bindable(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Array(_)
    )
}
