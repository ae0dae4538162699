//! Graph builders and canned workflows shared by the integration tests.

use astroflow_engine::condition::{Comparator, Condition};
use astroflow_engine::graph::{
    Edge, Graph, LoopConfig, Node, HANDLE_BODY, HANDLE_FALSE, HANDLE_NEXT, HANDLE_TRUE,
};
use astroflow_engine::VariableEnvironment;
use serde_json::Value;

/// Fluent builder for small workflow graphs.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn start(self, id: &str) -> Self {
        self.node(Node::start(id))
    }

    pub fn task(self, id: &str) -> Self {
        self.node(Node::task(id))
    }

    pub fn end(self, id: &str) -> Self {
        self.node(Node::end(id))
    }

    /// Plain edge without a source handle.
    pub fn edge(mut self, source: &str, target: &str) -> Self {
        self.edges.push(Edge::new(source, target));
        self
    }

    /// Edge leaving `source` through `handle`.
    pub fn port(mut self, source: &str, handle: &str, target: &str) -> Self {
        self.edges.push(Edge::from_handle(source, handle, target));
        self
    }

    pub fn build(self) -> Graph {
        Graph::new(self.nodes, self.edges)
    }
}

/// `s -> a -> b -> ... -> e`, with one task per name.
pub fn linear_chain(tasks: &[&str]) -> Graph {
    let mut builder = GraphBuilder::new().start("s");
    let mut previous = "s";
    for &task in tasks {
        builder = builder.task(task).edge(previous, task);
        previous = task;
    }
    builder.end("e").edge(previous, "e").build()
}

/// Start -> Branch(`x == 1`) with "true" to `n1` and "false" to `n2`.
pub fn branch_on_x() -> Graph {
    GraphBuilder::new()
        .start("s")
        .node(Node::branch("b", vec![Condition::new("x", Comparator::Eq, 1)]))
        .task("n1")
        .task("n2")
        .edge("s", "b")
        .port("b", HANDLE_TRUE, "n1")
        .port("b", HANDLE_FALSE, "n2")
        .build()
}

/// Start -> Loop(`config`) with "body" to `body` (looping back) and "next" to `after`.
pub fn loop_with(config: Option<LoopConfig>) -> Graph {
    GraphBuilder::new()
        .start("s")
        .node(Node::looping("l", config))
        .task("body")
        .end("after")
        .edge("s", "l")
        .port("l", HANDLE_BODY, "body")
        .port("l", HANDLE_NEXT, "after")
        .edge("body", "l")
        .build()
}

pub fn count_loop(count: u32) -> Graph {
    loop_with(Some(LoopConfig::count(count)))
}

pub fn for_each_loop(collection: &str) -> Graph {
    loop_with(Some(LoopConfig::for_each(collection)))
}

/// Environment from `(name, value)` pairs.
pub fn vars(pairs: &[(&str, Value)]) -> VariableEnvironment {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
