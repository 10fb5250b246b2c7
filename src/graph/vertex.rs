//! Vertex implementation for the property graph
//!
//! A vertex carries exactly one label, the way vertex labels work in the
//! schema-managed graph this store models.

use super::property::{PropertyMap, PropertyValue};
use super::types::{Label, VertexId};
use serde::{Deserialize, Serialize};

/// A vertex in the property graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    /// Unique identifier for this vertex
    pub id: VertexId,

    /// Vertex label
    pub label: Label,

    /// Properties associated with this vertex
    pub properties: PropertyMap,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Vertex {
    pub fn new(id: VertexId, label: impl Into<Label>, properties: PropertyMap) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Vertex {
            id,
            label: label.into(),
            properties,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace every property (upsert semantics)
    pub fn replace_properties(&mut self, properties: PropertyMap) {
        self.properties = properties;
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn has_label(&self, label: &Label) -> bool {
        &self.label == label
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Vertex {}
