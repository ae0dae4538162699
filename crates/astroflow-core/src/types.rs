use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of one controller run (one `start()` call).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events emitted while a workflow run progresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// A run was started from the Start node.
    RunStarted {
        run_id: RunId,
        started_at: DateTime<Utc>,
    },
    /// A node became current. Fires once per step.
    NodeVisited {
        run_id: Option<RunId>,
        node_id: String,
        step: usize,
        /// Observers should center their view on the node.
        center_view: bool,
    },
    /// The run loop was suspended by `pause()`.
    RunPaused { run_id: RunId },
    /// The run loop was released by a second `pause()`.
    RunResumed { run_id: RunId },
    /// The run was stopped externally.
    RunStopped { run_id: RunId, steps: usize },
    /// The traversal reached a node without a successor.
    RunCompleted { run_id: RunId, steps: usize },
    /// The run ended because of an error.
    RunFailed {
        run_id: Option<RunId>,
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_unique() {
        assert_ne!(RunId::new(), RunId::new());
        assert_eq!(RunId::from_str("abc").to_string(), "abc");
    }

    #[test]
    fn test_event_serialization() {
        let event = RunEvent::NodeVisited {
            run_id: Some(RunId::from_str("r1")),
            node_id: "focus".into(),
            step: 3,
            center_view: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "node_visited");
        assert_eq!(json["node_id"], "focus");
        assert_eq!(json["step"], 3);
    }
}
