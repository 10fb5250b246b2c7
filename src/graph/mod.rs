//! Embedded property-graph store
//!
//! This module implements the graph side of the dual store:
//! - Single-label vertices and directed labeled edges held in memory
//! - Schema management with typed property keys and unique key indexes
//! - A write-ahead log replayed on open
//! - Key-addressed upserts that maintain relationship edges
//! - Traversal queries for the e-commerce access patterns

pub mod database;
pub mod edge;
pub mod mapping;
pub mod property;
pub mod schema;
pub mod store;
pub mod traversal;
pub mod types;
pub mod vertex;
pub mod wal;

// Re-export main types
pub use database::{property_type_for, schema_ops, GraphDatabase};
pub use edge::Edge;
pub use property::{PropertyMap, PropertyType, PropertyValue};
pub use schema::{GraphSchema, SchemaOp};
pub use store::{BackRef, GraphStore, Link, Mutation};
pub use traversal::GraphTraversal;
pub use types::{EdgeId, EdgeLabel, Label, VertexId, VertexKey};
pub use vertex::Vertex;
pub use wal::{Wal, WalError, WalResult};

use thiserror::Error;

/// Errors that can occur during graph operations
#[derive(Error, Debug)]
pub enum GraphError {
    /// A write used an undeclared label or property, or a mistyped value
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// A schema declaration contradicts an existing one
    #[error("Schema conflict: {0}")]
    SchemaConflict(String),

    /// An entity could not be translated to or from a vertex
    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
}

pub type GraphResult<T> = Result<T, GraphError>;
