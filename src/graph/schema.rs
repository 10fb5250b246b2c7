//! Graph schema management
//!
//! Property keys carry a declared data type, vertex labels may constrain the
//! set of properties they accept, and each keyed label has a unique index on
//! its key property. Every declaration is "create if not exists": declaring
//! the same thing twice is a no-op, declaring it differently is a conflict.
//! Automatic schema creation is disabled, so writes that use an undeclared
//! label, edge label or property key are rejected.

use super::property::{PropertyMap, PropertyType};
use super::types::{EdgeLabel, Label};
use super::{GraphError, GraphResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// A single schema declaration, logged to the WAL like any other mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SchemaOp {
    PropertyKey {
        name: String,
        data_type: PropertyType,
    },
    VertexLabel {
        name: Label,
    },
    EdgeLabel {
        name: EdgeLabel,
    },
    /// Restrict a vertex label to the listed property keys
    PropertyConstraint {
        label: Label,
        properties: Vec<String>,
    },
    UniqueIndex {
        name: String,
        label: Label,
        property: String,
    },
}

/// Declared shape of a vertex label
#[derive(Debug, Clone, Default)]
pub struct LabelSchema {
    /// Allowed property keys; empty means unconstrained
    pub properties: BTreeSet<String>,
    /// (index name, key property) of the unique index, if any
    pub unique_key: Option<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct GraphSchema {
    property_keys: HashMap<String, PropertyType>,
    vertex_labels: HashMap<Label, LabelSchema>,
    edge_labels: HashSet<EdgeLabel>,
}

impl GraphSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a declaration against the current schema without applying it
    pub fn check(&self, op: &SchemaOp) -> GraphResult<()> {
        match op {
            SchemaOp::PropertyKey { name, data_type } => match self.property_keys.get(name) {
                Some(existing) if existing != data_type => Err(GraphError::SchemaConflict(format!(
                    "property key {} already declared as {}, not {}",
                    name, existing, data_type
                ))),
                _ => Ok(()),
            },
            SchemaOp::VertexLabel { .. } | SchemaOp::EdgeLabel { .. } => Ok(()),
            SchemaOp::PropertyConstraint { label, properties } => {
                self.require_label(label)?;
                for property in properties {
                    self.require_property_key(property)?;
                }
                Ok(())
            }
            SchemaOp::UniqueIndex {
                name,
                label,
                property,
            } => {
                let schema = self.require_label(label)?;
                self.require_property_key(property)?;
                match &schema.unique_key {
                    Some((existing, key)) if existing != name || key != property => {
                        Err(GraphError::SchemaConflict(format!(
                            "label {} already has unique index {} on {}",
                            label, existing, key
                        )))
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    /// Apply a declaration. Returns `true` if the schema changed.
    pub fn apply(&mut self, op: &SchemaOp) -> GraphResult<bool> {
        self.check(op)?;
        let changed = match op {
            SchemaOp::PropertyKey { name, data_type } => {
                self.property_keys.insert(name.clone(), *data_type).is_none()
            }
            SchemaOp::VertexLabel { name } => {
                if self.vertex_labels.contains_key(name) {
                    false
                } else {
                    self.vertex_labels.insert(name.clone(), LabelSchema::default());
                    true
                }
            }
            SchemaOp::EdgeLabel { name } => self.edge_labels.insert(name.clone()),
            SchemaOp::PropertyConstraint { label, properties } => {
                let schema = self.label_mut(label)?;
                let before = schema.properties.len();
                schema.properties.extend(properties.iter().cloned());
                schema.properties.len() != before
            }
            SchemaOp::UniqueIndex {
                name,
                label,
                property,
            } => {
                let schema = self.label_mut(label)?;
                let changed = schema.unique_key.is_none();
                schema.unique_key = Some((name.clone(), property.clone()));
                changed
            }
        };
        Ok(changed)
    }

    /// Validate a vertex write: declared label, declared and correctly typed
    /// properties, permitted by the label's constraint, keyed by its unique index
    pub fn validate_vertex(
        &self,
        label: &Label,
        key_property: &str,
        properties: &PropertyMap,
    ) -> GraphResult<()> {
        let schema = self.require_label(label)?;
        match &schema.unique_key {
            Some((_, key)) if key == key_property => {}
            _ => {
                return Err(GraphError::SchemaViolation(format!(
                    "label {} has no unique index on {}",
                    label, key_property
                )))
            }
        }

        for (name, value) in properties {
            let declared = self.require_property_key(name)?;
            if declared != value.property_type() {
                return Err(GraphError::SchemaViolation(format!(
                    "property {} is declared {} but got {}",
                    name,
                    declared,
                    value.property_type()
                )));
            }
            if !schema.properties.is_empty() && !schema.properties.contains(name) {
                return Err(GraphError::SchemaViolation(format!(
                    "property {} is not allowed on label {}",
                    name, label
                )));
            }
        }
        Ok(())
    }

    pub fn require_edge_label(&self, label: &EdgeLabel) -> GraphResult<()> {
        if self.edge_labels.contains(label) {
            Ok(())
        } else {
            Err(GraphError::SchemaViolation(format!(
                "edge label {} is not declared",
                label
            )))
        }
    }

    pub fn property_type(&self, name: &str) -> Option<PropertyType> {
        self.property_keys.get(name).copied()
    }

    pub fn label(&self, label: &Label) -> Option<&LabelSchema> {
        self.vertex_labels.get(label)
    }

    pub fn has_edge_label(&self, label: &EdgeLabel) -> bool {
        self.edge_labels.contains(label)
    }

    pub fn property_key_count(&self) -> usize {
        self.property_keys.len()
    }

    pub fn vertex_label_count(&self) -> usize {
        self.vertex_labels.len()
    }

    pub fn edge_label_count(&self) -> usize {
        self.edge_labels.len()
    }

    fn require_label(&self, label: &Label) -> GraphResult<&LabelSchema> {
        self.vertex_labels.get(label).ok_or_else(|| {
            GraphError::SchemaViolation(format!("vertex label {} is not declared", label))
        })
    }

    fn require_property_key(&self, name: &str) -> GraphResult<PropertyType> {
        self.property_type(name).ok_or_else(|| {
            GraphError::SchemaViolation(format!("property key {} is not declared", name))
        })
    }

    fn label_mut(&mut self, label: &Label) -> GraphResult<&mut LabelSchema> {
        self.vertex_labels.get_mut(label).ok_or_else(|| {
            GraphError::SchemaViolation(format!("vertex label {} is not declared", label))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PropertyValue;

    fn user_schema() -> GraphSchema {
        let mut schema = GraphSchema::new();
        for op in [
            SchemaOp::PropertyKey {
                name: "user_id".into(),
                data_type: PropertyType::String,
            },
            SchemaOp::PropertyKey {
                name: "username".into(),
                data_type: PropertyType::String,
            },
            SchemaOp::VertexLabel {
                name: Label::new("user"),
            },
            SchemaOp::PropertyConstraint {
                label: Label::new("user"),
                properties: vec!["user_id".into(), "username".into()],
            },
            SchemaOp::UniqueIndex {
                name: "userByuser_id".into(),
                label: Label::new("user"),
                property: "user_id".into(),
            },
        ] {
            schema.apply(&op).unwrap();
        }
        schema
    }

    #[test]
    fn test_declarations_are_idempotent() {
        let mut schema = user_schema();
        let again = SchemaOp::PropertyKey {
            name: "username".into(),
            data_type: PropertyType::String,
        };
        assert!(!schema.apply(&again).unwrap());
        assert!(!schema
            .apply(&SchemaOp::VertexLabel {
                name: Label::new("user")
            })
            .unwrap());
        assert_eq!(schema.property_key_count(), 2);
    }

    #[test]
    fn test_conflicting_property_type() {
        let mut schema = user_schema();
        let conflict = SchemaOp::PropertyKey {
            name: "username".into(),
            data_type: PropertyType::Integer,
        };
        assert!(matches!(
            schema.apply(&conflict),
            Err(GraphError::SchemaConflict(_))
        ));
    }

    #[test]
    fn test_validate_vertex() {
        let schema = user_schema();
        let label = Label::new("user");

        let mut props = PropertyMap::new();
        props.insert("user_id".into(), "u1".into());
        props.insert("username".into(), "alice".into());
        schema.validate_vertex(&label, "user_id", &props).unwrap();

        props.insert("username".into(), PropertyValue::Integer(3));
        assert!(matches!(
            schema.validate_vertex(&label, "user_id", &props),
            Err(GraphError::SchemaViolation(_))
        ));

        let mut unknown = PropertyMap::new();
        unknown.insert("nickname".into(), "al".into());
        assert!(schema.validate_vertex(&label, "user_id", &unknown).is_err());
        assert!(schema
            .validate_vertex(&Label::new("robot"), "user_id", &PropertyMap::new())
            .is_err());
    }
}
