use thiserror::Error;

#[derive(Debug, Error)]
pub enum AstroflowError {
    // Workflow shape errors
    #[error("Workflow configuration error: {0}")]
    WorkflowConfig(String),

    // Device action errors
    #[error("Action failed on node {node_id}: {message}")]
    ActionFailed { node_id: String, message: String },

    // Run loop task errors
    #[error("Run loop aborted: {0}")]
    RunAborted(String),

    // Settings errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AstroflowError {
    /// Whether this error describes a malformed workflow graph.
    pub fn is_workflow_config(&self) -> bool {
        matches!(self, Self::WorkflowConfig(_))
    }
}

pub type Result<T> = std::result::Result<T, AstroflowError>;
