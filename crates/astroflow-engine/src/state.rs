use serde::Serialize;

use crate::environment::VariableEnvironment;

/// Observable state of the execution controller.
///
/// Snapshots are cheap clones handed to observers; mutating a snapshot has no
/// effect on the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    pub is_running: bool,
    pub is_paused: bool,
    pub current_node_id: Option<String>,
    /// Every node visited since the last start, in order. Repeats allowed.
    pub execution_path: Vec<String>,
    pub variables: VariableEnvironment,
    pub step_delay_ms: u64,
    pub center_on_step: bool,
    /// Message of the error that ended the last run, if any.
    pub error: Option<String>,
}

impl ExecutionState {
    pub fn new(step_delay_ms: u64, center_on_step: bool) -> Self {
        Self {
            is_running: false,
            is_paused: false,
            current_node_id: None,
            execution_path: Vec::new(),
            variables: VariableEnvironment::new(),
            step_delay_ms,
            center_on_step,
            error: None,
        }
    }

    /// Number of nodes visited so far.
    pub fn steps(&self) -> usize {
        self.execution_path.len()
    }

    pub(crate) fn visit(&mut self, node_id: String) {
        self.execution_path.push(node_id.clone());
        self.current_node_id = Some(node_id);
    }

    /// Back to idle. The execution path is kept for inspection.
    pub(crate) fn finish(&mut self) {
        self.is_running = false;
        self.is_paused = false;
        self.current_node_id = None;
    }
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new(1000, true)
    }
}
