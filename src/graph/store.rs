//! In-memory graph storage implementation
//!
//! Uses hash maps for O(1) lookup:
//! - vertices: VertexId -> Vertex
//! - edges: EdgeId -> Edge
//! - outgoing / incoming: VertexId -> Vec<EdgeId> (adjacency lists)
//! - label_index: Label -> set of VertexId
//! - unique_index: VertexKey -> VertexId (the per-label unique key index)
//!
//! All writes arrive as [`Mutation`]s so that the same code path serves live
//! writes and WAL replay.

use super::edge::Edge;
use super::property::{PropertyMap, PropertyValue};
use super::schema::{GraphSchema, SchemaOp};
use super::types::{EdgeId, EdgeLabel, Label, VertexId, VertexKey};
use super::vertex::Vertex;
use super::{GraphError, GraphResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Incoming edge that an upserted vertex should carry
///
/// The edge runs `from -> upserted vertex`. If `from` does not exist yet the
/// edge is skipped; a later upsert of `from` attaches it through a [`BackRef`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub label: EdgeLabel,
    pub from: VertexKey,
}

/// Outgoing edges an upserted vertex should grow towards existing holders
///
/// Every vertex of `holder` whose `reference_property` equals the upserted
/// vertex's key value gets an edge `upserted -> holder` labeled `label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackRef {
    pub label: EdgeLabel,
    pub holder: Label,
    pub reference_property: String,
}

/// A logical graph mutation, addressed by key rather than by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    Schema(SchemaOp),
    /// Create or replace a vertex; properties are replaced wholesale
    UpsertVertex {
        key: VertexKey,
        properties: PropertyMap,
        links: Vec<Link>,
        backrefs: Vec<BackRef>,
    },
    /// Remove a vertex and all incident edges; no-op if absent
    DropVertex { key: VertexKey },
}

/// In-memory property graph
#[derive(Debug, Default)]
pub struct GraphStore {
    schema: GraphSchema,
    vertices: HashMap<VertexId, Vertex>,
    edges: HashMap<EdgeId, Edge>,
    outgoing: HashMap<VertexId, Vec<EdgeId>>,
    incoming: HashMap<VertexId, Vec<EdgeId>>,
    label_index: HashMap<Label, HashSet<VertexId>>,
    unique_index: HashMap<VertexKey, VertexId>,
    next_vertex_id: u64,
    next_edge_id: u64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            next_vertex_id: 1,
            next_edge_id: 1,
            ..Default::default()
        }
    }

    pub fn schema(&self) -> &GraphSchema {
        &self.schema
    }

    /// Check a mutation without applying it
    pub fn validate(&self, mutation: &Mutation) -> GraphResult<()> {
        match mutation {
            Mutation::Schema(op) => self.schema.check(op),
            Mutation::UpsertVertex {
                key,
                properties,
                links,
                backrefs,
            } => {
                if let Some(value) = properties.get(&key.property) {
                    if value.as_string() != Some(key.value.as_str()) {
                        return Err(GraphError::SchemaViolation(format!(
                            "key property {} does not match vertex key {}",
                            key.property, key
                        )));
                    }
                }
                let mut full = properties.clone();
                full.insert(key.property.clone(), PropertyValue::String(key.value.clone()));
                self.schema.validate_vertex(&key.label, &key.property, &full)?;

                for link in links {
                    self.schema.require_edge_label(&link.label)?;
                }
                for backref in backrefs {
                    self.schema.require_edge_label(&backref.label)?;
                }
                Ok(())
            }
            Mutation::DropVertex { .. } => Ok(()),
        }
    }

    /// Validate and apply a mutation
    pub fn apply(&mut self, mutation: Mutation) -> GraphResult<()> {
        self.validate(&mutation)?;
        match mutation {
            Mutation::Schema(op) => {
                self.schema.apply(&op)?;
            }
            Mutation::UpsertVertex {
                key,
                properties,
                links,
                backrefs,
            } => {
                self.upsert_vertex(key, properties, links, backrefs);
            }
            Mutation::DropVertex { key } => {
                self.drop_vertex(&key);
            }
        }
        Ok(())
    }

    fn upsert_vertex(
        &mut self,
        key: VertexKey,
        mut properties: PropertyMap,
        links: Vec<Link>,
        backrefs: Vec<BackRef>,
    ) -> VertexId {
        properties.insert(key.property.clone(), PropertyValue::String(key.value.clone()));

        let id = match self.unique_index.get(&key).copied() {
            Some(id) => {
                if let Some(vertex) = self.vertices.get_mut(&id) {
                    vertex.replace_properties(properties);
                }
                id
            }
            None => {
                let id = VertexId::new(self.next_vertex_id);
                self.next_vertex_id += 1;
                self.vertices
                    .insert(id, Vertex::new(id, key.label.clone(), properties));
                self.label_index
                    .entry(key.label.clone())
                    .or_default()
                    .insert(id);
                self.unique_index.insert(key.clone(), id);
                id
            }
        };

        for link in links {
            let source = self.unique_index.get(&link.from).copied();
            let stale: Vec<EdgeId> = self
                .in_edges(id)
                .filter(|e| e.label == link.label && Some(e.source) != source)
                .map(|e| e.id)
                .collect();
            for edge_id in stale {
                self.remove_edge(edge_id);
            }
            if let Some(source) = source {
                self.ensure_edge(source, id, link.label);
            }
        }

        for backref in backrefs {
            let holders: Vec<VertexId> = self
                .vertices_with_label(&backref.holder)
                .into_iter()
                .filter(|v| {
                    v.get_property(&backref.reference_property)
                        .and_then(PropertyValue::as_string)
                        == Some(key.value.as_str())
                })
                .map(|v| v.id)
                .collect();
            for holder in holders {
                self.ensure_edge(id, holder, backref.label.clone());
            }
        }

        id
    }

    fn drop_vertex(&mut self, key: &VertexKey) -> bool {
        let Some(id) = self.unique_index.remove(key) else {
            return false;
        };

        let incident: Vec<EdgeId> = self
            .outgoing
            .get(&id)
            .into_iter()
            .chain(self.incoming.get(&id))
            .flatten()
            .copied()
            .collect();
        for edge_id in incident {
            self.remove_edge(edge_id);
        }

        self.outgoing.remove(&id);
        self.incoming.remove(&id);
        if let Some(ids) = self.label_index.get_mut(&key.label) {
            ids.remove(&id);
        }
        self.vertices.remove(&id).is_some()
    }

    /// Add `source -label-> target` unless an identical edge exists
    fn ensure_edge(&mut self, source: VertexId, target: VertexId, label: EdgeLabel) {
        let exists = self
            .out_edges(source)
            .any(|e| e.target == target && e.label == label);
        if exists {
            return;
        }

        let id = EdgeId::new(self.next_edge_id);
        self.next_edge_id += 1;
        self.edges.insert(id, Edge::new(id, source, target, label));
        self.outgoing.entry(source).or_default().push(id);
        self.incoming.entry(target).or_default().push(id);
    }

    fn remove_edge(&mut self, id: EdgeId) {
        if let Some(edge) = self.edges.remove(&id) {
            if let Some(out) = self.outgoing.get_mut(&edge.source) {
                out.retain(|e| *e != id);
            }
            if let Some(inc) = self.incoming.get_mut(&edge.target) {
                inc.retain(|e| *e != id);
            }
        }
    }

    /// Look a vertex up through the unique key index
    pub fn lookup(&self, key: &VertexKey) -> Option<&Vertex> {
        self.unique_index
            .get(key)
            .and_then(|id| self.vertices.get(id))
    }

    pub fn get_vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    pub fn vertices_with_label(&self, label: &Label) -> Vec<&Vertex> {
        self.label_index
            .get(label)
            .map(|ids| ids.iter().filter_map(|id| self.vertices.get(id)).collect())
            .unwrap_or_default()
    }

    /// Vertices of `label` whose `property` equals `value` (full label scan)
    pub fn find_by_property(
        &self,
        label: &Label,
        property: &str,
        value: &PropertyValue,
    ) -> Vec<&Vertex> {
        self.vertices_with_label(label)
            .into_iter()
            .filter(|v| v.get_property(property) == Some(value))
            .collect()
    }

    pub fn out_edges(&self, id: VertexId) -> impl Iterator<Item = &Edge> {
        self.outgoing
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|e| self.edges.get(e))
    }

    pub fn in_edges(&self, id: VertexId) -> impl Iterator<Item = &Edge> {
        self.incoming
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|e| self.edges.get(e))
    }

    /// Targets of outgoing `label` edges
    pub fn out_neighbors(&self, id: VertexId, label: &EdgeLabel) -> Vec<&Vertex> {
        self.out_edges(id)
            .filter(|e| &e.label == label)
            .filter_map(|e| self.vertices.get(&e.target))
            .collect()
    }

    /// Sources of incoming `label` edges
    pub fn in_neighbors(&self, id: VertexId, label: &EdgeLabel) -> Vec<&Vertex> {
        self.in_edges(id)
            .filter(|e| &e.label == label)
            .filter_map(|e| self.vertices.get(&e.source))
            .collect()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
