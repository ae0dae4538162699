//! Workflow graph model: typed nodes and edges with read-only lookups.
//!
//! A workflow is a directed graph of `Node`s connected by `Edge`s. Branch and
//! Loop nodes select their successor by the edge's source handle; every other
//! kind follows its first outgoing edge. The graph is an immutable snapshot:
//! the editor builds a fresh one before each run.

pub mod edge;
pub mod node;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use astroflow_core::error::{AstroflowError, Result};

pub use edge::{Edge, EdgeStyle, HANDLE_BODY, HANDLE_FALSE, HANDLE_NEXT, HANDLE_TRUE};
pub use node::{
    ExposureConfig, FocusMethod, LoopConfig, Node, NodeKind, Params, Position, Priority,
    TaskParameter, Validation,
};

/// Serializable form of a graph, as handed over by the editor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// Indexed, read-only workflow graph.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<String, usize>,
}

impl Graph {
    /// Build a graph. Duplicate ids resolve to the first node; see [`Graph::validate`].
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            index.entry(node.id.clone()).or_insert(i);
        }
        Self {
            nodes,
            edges,
            index,
        }
    }

    /// Parse a graph snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: GraphSnapshot = serde_json::from_str(json)?;
        Ok(snapshot.into())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Edges leaving `node_id`, in edge-list order.
    pub fn outgoing_edges(&self, node_id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.source == node_id).collect()
    }

    /// First edge leaving `node_id` through exactly the given handle.
    pub fn outgoing_edge(&self, node_id: &str, handle: &str) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.source == node_id && e.has_handle(handle))
    }

    /// First Start node in node order.
    pub fn start_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.is_start())
    }

    /// Check the graph shape before a run.
    ///
    /// A missing Start node or a duplicate node id is a configuration error.
    /// Extra Start nodes and dangling edges only produce warnings: traversal
    /// uses the first Start node and ends naturally at a dangling edge.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(AstroflowError::WorkflowConfig(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        let starts: Vec<&str> = self
            .nodes
            .iter()
            .filter(|n| n.is_start())
            .map(|n| n.id.as_str())
            .collect();
        match starts.as_slice() {
            [] => {
                return Err(AstroflowError::WorkflowConfig(
                    "workflow has no start node".to_string(),
                ))
            }
            [_] => {}
            [first, ..] => {
                warn!(
                    start_nodes = starts.len(),
                    using = %first,
                    "Workflow has multiple start nodes, using the first"
                );
            }
        }

        for edge in &self.edges {
            if !self.index.contains_key(&edge.source) || !self.index.contains_key(&edge.target) {
                warn!(
                    edge_id = %edge.id,
                    source = %edge.source,
                    target = %edge.target,
                    "Edge references a node that is not in the workflow"
                );
            }
        }

        Ok(())
    }

    /// Convert back into the serializable form.
    pub fn to_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }
}

impl From<GraphSnapshot> for Graph {
    fn from(snapshot: GraphSnapshot) -> Self {
        Self::new(snapshot.nodes, snapshot.edges)
    }
}
