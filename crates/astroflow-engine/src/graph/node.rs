use serde::{Deserialize, Serialize};

use crate::condition::Condition;

/// Canvas coordinate of a node. Only the editor cares about it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A vertex in the workflow graph.
///
/// The kind-specific payload lives in [`NodeKind`]; each kind carries exactly
/// the fields it needs, so a Branch always has a condition list and a Loop
/// always has an (optional) loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within the graph.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Display description.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub position: Position,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// Node kind together with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum NodeKind {
    Start,
    End,
    Task {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<Priority>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assignee: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tags: Vec<String>,
    },
    Decision,
    Branch {
        /// Evaluated in order; any satisfied condition selects the `true` port.
        #[serde(default)]
        conditions: Vec<Condition>,
    },
    Loop {
        /// Without a configuration the loop passes straight through to `next`.
        #[serde(default)]
        loop_config: Option<LoopConfig>,
    },
    Group,
    SmartExposure {
        #[serde(default)]
        exposure_config: Option<ExposureConfig>,
        #[serde(default)]
        params: Params,
    },
    FilterWheel {
        #[serde(default)]
        params: Params,
    },
    Focus {
        #[serde(default)]
        focus_method: FocusMethod,
        #[serde(default)]
        step_size: Option<f64>,
        #[serde(default)]
        params: Params,
    },
    Dither {
        #[serde(default)]
        params: Params,
    },
    PlateSolving {
        #[serde(default)]
        params: Params,
    },
    Cooling {
        #[serde(default)]
        params: Params,
    },
    FileUpload {
        #[serde(default)]
        params: Params,
    },
    FileDownload {
        #[serde(default)]
        params: Params,
    },
    FolderManager {
        #[serde(default)]
        params: Params,
    },
}

impl NodeKind {
    /// Wire name of the kind, as it appears in the `type` field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Task { .. } => "task",
            Self::Decision => "decision",
            Self::Branch { .. } => "branch",
            Self::Loop { .. } => "loop",
            Self::Group => "group",
            Self::SmartExposure { .. } => "smartExposure",
            Self::FilterWheel { .. } => "filterWheel",
            Self::Focus { .. } => "focus",
            Self::Dither { .. } => "dither",
            Self::PlateSolving { .. } => "plateSolving",
            Self::Cooling { .. } => "cooling",
            Self::FileUpload { .. } => "fileUpload",
            Self::FileDownload { .. } => "fileDownload",
            Self::FolderManager { .. } => "folderManager",
        }
    }

    /// Parameter block of imaging and data kinds.
    pub fn params(&self) -> Option<&Params> {
        match self {
            Self::SmartExposure { params, .. }
            | Self::FilterWheel { params }
            | Self::Focus { params, .. }
            | Self::Dither { params }
            | Self::PlateSolving { params }
            | Self::Cooling { params }
            | Self::FileUpload { params }
            | Self::FileDownload { params }
            | Self::FolderManager { params } => Some(params),
            _ => None,
        }
    }
}

/// Loop behavior of a Loop node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LoopConfig {
    /// Run the body a fixed number of times.
    Count {
        /// Missing or zero means one iteration.
        #[serde(default)]
        count: Option<u32>,
        /// Shown by the editor; traversal ignores it.
        #[serde(default)]
        max_iterations: Option<u32>,
    },
    /// Run the body while the condition holds. Uncounted.
    While {
        #[serde(default)]
        condition: Option<Condition>,
    },
    /// Run the body once per element of an array variable, binding `current`.
    ForEach {
        #[serde(default)]
        collection: String,
    },
}

impl LoopConfig {
    pub fn count(count: u32) -> Self {
        Self::Count {
            count: Some(count),
            max_iterations: None,
        }
    }

    pub fn while_true(condition: Condition) -> Self {
        Self::While {
            condition: Some(condition),
        }
    }

    pub fn for_each(collection: impl Into<String>) -> Self {
        Self::ForEach {
            collection: collection.into(),
        }
    }

    /// Number of body iterations a Count loop schedules. `None` for other kinds.
    ///
    /// `max_iterations` is editor metadata and does not bound the count.
    pub fn iteration_limit(&self) -> Option<u32> {
        match self {
            Self::Count { count, .. } => Some(count.filter(|c| *c > 0).unwrap_or(1)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusMethod {
    #[default]
    Auto,
    Relative,
    Absolute,
}

/// Camera settings of a SmartExposure node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureConfig {
    /// Exposure time in seconds.
    #[serde(default)]
    pub exposure_time: f64,
    #[serde(default)]
    pub gain: Option<f64>,
    #[serde(default)]
    pub binning: Option<u32>,
    #[serde(default)]
    pub frame: Option<String>,
    #[serde(default)]
    pub is_auto_exposure: bool,
}

/// Declared inputs and outputs of an imaging or data node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    #[serde(default)]
    pub inputs: Vec<TaskParameter>,
    #[serde(default)]
    pub outputs: Vec<TaskParameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskParameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default_value: Option<serde_json::Value>,
    #[serde(default)]
    pub validation: Option<Validation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Node {
    /// Create a node of the given kind with an empty display name.
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            description: String::new(),
            position: Position::default(),
            kind,
        }
    }

    pub fn start(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Start)
    }

    pub fn end(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::End)
    }

    pub fn task(id: impl Into<String>) -> Self {
        Self::new(
            id,
            NodeKind::Task {
                priority: None,
                assignee: None,
                tags: vec![],
            },
        )
    }

    pub fn branch(id: impl Into<String>, conditions: Vec<Condition>) -> Self {
        Self::new(id, NodeKind::Branch { conditions })
    }

    pub fn looping(id: impl Into<String>, loop_config: Option<LoopConfig>) -> Self {
        Self::new(id, NodeKind::Loop { loop_config })
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the display description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the canvas position.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }

    pub fn is_start(&self) -> bool {
        matches!(self.kind, NodeKind::Start)
    }
}
