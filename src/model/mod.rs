//! Record model
//!
//! Canonical in-memory representation of the four domain entities:
//! - `Entity`: kind + immutable key + scalar field map, the unit the
//!   coordinator writes to both stores
//! - Typed records (`User`, `Product`, `Order`, `Review`) that validate
//!   their constraints on the way into an `Entity`

pub mod entity;
pub mod records;

pub use entity::{Entity, EntityKey, EntityKind, EntityRef, FieldMap, FieldType, FieldValue};
pub use records::{Order, OrderStatus, Product, Record, Review, User};

use thiserror::Error;

/// Record model errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Entity kind name not recognised
    #[error("Unknown entity kind: {0}")]
    UnknownKind(String),

    /// Entity of the wrong kind handed to a typed record
    #[error("Expected {expected} entity, found {found}")]
    KindMismatch {
        expected: EntityKind,
        found: EntityKind,
    },

    /// Required field absent
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Field present with the wrong scalar type
    #[error("Field {field} has type {found}, expected {expected}")]
    FieldType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Field value violates a domain constraint
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

pub type ModelResult<T> = Result<T, ModelError>;
