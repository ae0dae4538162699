use serde::{Deserialize, Serialize};

/// Output port taken when a Branch node has a satisfied condition.
pub const HANDLE_TRUE: &str = "true";
/// Output port taken when no Branch condition is satisfied.
pub const HANDLE_FALSE: &str = "false";
/// Output port leading into a loop body.
pub const HANDLE_BODY: &str = "body";
/// Output port leaving a loop.
pub const HANDLE_NEXT: &str = "next";

/// A directed transition between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Named output port of the source node. Unset for linear nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub animated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<EdgeStyle>,
}

/// Display-only edge styling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeStyle {
    #[serde(default)]
    pub stroke: Option<String>,
}

impl Edge {
    /// Create an edge without a source handle.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("e-{}-{}", source, target),
            source,
            target,
            source_handle: None,
            animated: false,
            style: None,
        }
    }

    /// Create an edge leaving `source` through the named output port.
    pub fn from_handle(
        source: impl Into<String>,
        handle: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let handle = handle.into();
        let mut edge = Self::new(source, target);
        edge.id = format!("e-{}-{}-{}", edge.source, handle, edge.target);
        edge.source_handle = Some(handle);
        edge
    }

    /// Override the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Whether this edge leaves through the given port.
    pub fn has_handle(&self, handle: &str) -> bool {
        self.source_handle.as_deref() == Some(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_builders() {
        let e = Edge::new("a", "b");
        assert_eq!(e.source, "a");
        assert_eq!(e.target, "b");
        assert_eq!(e.id, "e-a-b");
        assert!(e.source_handle.is_none());

        let e = Edge::from_handle("branch", HANDLE_TRUE, "yes");
        assert_eq!(e.id, "e-branch-true-yes");
        assert!(e.has_handle(HANDLE_TRUE));
        assert!(!e.has_handle(HANDLE_FALSE));

        let e = Edge::new("a", "b").with_id("custom");
        assert_eq!(e.id, "custom");
    }

    #[test]
    fn test_deserialize_editor_edge() {
        let json = r##"{
            "id": "reactflow__edge-l1body-t1",
            "source": "l1",
            "target": "t1",
            "sourceHandle": "body",
            "animated": true,
            "style": {"stroke": "#888"}
        }"##;
        let edge: Edge = serde_json::from_str(json).unwrap();
        assert!(edge.has_handle(HANDLE_BODY));
        assert!(edge.animated);
        assert_eq!(edge.style.unwrap().stroke.as_deref(), Some("#888"));
    }

    #[test]
    fn test_missing_handle_defaults_to_none() {
        let edge: Edge = serde_json::from_str(r#"{"id": "e", "source": "a", "target": "b"}"#).unwrap();
        assert!(edge.source_handle.is_none());
        assert!(!edge.animated);
    }
}
