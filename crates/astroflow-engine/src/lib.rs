pub mod actions;
pub mod condition;
pub mod controller;
pub mod engine;
pub mod environment;
pub mod graph;
pub mod state;

pub use actions::{NodeAction, SimulatedActions};
pub use condition::{evaluate, first_match, Comparator, Condition, Literal};
pub use controller::{ControllerBuilder, ExecutionController};
pub use engine::ExecutionEngine;
pub use environment::{VariableEnvironment, CURRENT_ITEM};
pub use graph::{
    Edge, ExposureConfig, FocusMethod, Graph, GraphSnapshot, LoopConfig, Node, NodeKind, Params,
    Position, HANDLE_BODY, HANDLE_FALSE, HANDLE_NEXT, HANDLE_TRUE,
};
pub use state::ExecutionState;
