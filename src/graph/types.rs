//! Core type definitions for the graph store

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-local vertex handle
///
/// Assigned in insertion order and never persisted: the WAL records
/// [`VertexKey`]s, so ids may differ after a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexId(u64);

impl VertexId {
    pub(crate) fn new(id: u64) -> Self {
        VertexId(id)
    }
}

/// Store-local edge handle; same lifetime rules as [`VertexId`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(u64);

impl EdgeId {
    pub(crate) fn new(id: u64) -> Self {
        EdgeId(id)
    }
}

/// Vertex label (e.g., "user", "product")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Label(String);

impl Label {
    pub fn new(label: impl Into<String>) -> Self {
        Label(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Label(s)
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label(s.to_string())
    }
}

/// Edge label (relationship type, e.g., "placed_order")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EdgeLabel(String);

impl EdgeLabel {
    pub fn new(edge_label: impl Into<String>) -> Self {
        EdgeLabel(edge_label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EdgeLabel {
    fn from(s: String) -> Self {
        EdgeLabel(s)
    }
}

impl From<&str> for EdgeLabel {
    fn from(s: &str) -> Self {
        EdgeLabel(s.to_string())
    }
}

/// Logical address of a vertex: label + unique key property + key value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexKey {
    pub label: Label,
    pub property: String,
    pub value: String,
}

impl VertexKey {
    pub fn new(label: impl Into<Label>, property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            property: property.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for VertexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}={}]", self.label, self.property, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label() {
        let label = Label::new("user");
        assert_eq!(label.as_str(), "user");
        let label2: Label = "product".into();
        assert_eq!(format!("{}", label2), "product");
    }

    #[test]
    fn test_vertex_key_display() {
        let key = VertexKey::new("user", "user_id", "u1");
        assert_eq!(format!("{}", key), "user[user_id=u1]");
    }

    #[test]
    fn test_handles_follow_insertion_order() {
        assert!(VertexId::new(1) < VertexId::new(2));
        assert!(EdgeId::new(7) < EdgeId::new(8));
    }
}
