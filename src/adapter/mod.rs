//! Store adapters: a uniform put/get/delete capability over each store
//!
//! Adapters translate canonical entities to the store-native shape through
//! the store binding and classify every store failure as transient
//! (retryable) or permanent. `put` is an idempotent upsert in both stores.

pub mod fault;
pub mod graph;
pub mod tabular;

pub use fault::{FaultPlan, FaultyAdapter};
pub use graph::GraphAdapter;
pub use tabular::TabularAdapter;

use crate::model::{Entity, EntityKind, EntityKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which of the two stores an adapter talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreSide {
    Graph,
    Tabular,
}

impl StoreSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreSide::Graph => "graph",
            StoreSide::Tabular => "tabular",
        }
    }

    pub fn other(&self) -> StoreSide {
        match self {
            StoreSide::Graph => StoreSide::Tabular,
            StoreSide::Tabular => StoreSide::Graph,
        }
    }
}

impl fmt::Display for StoreSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StoreSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "graph" => Ok(StoreSide::Graph),
            "tabular" => Ok(StoreSide::Tabular),
            other => Err(format!("unknown store {:?} (expected graph or tabular)", other)),
        }
    }
}

/// Classified adapter failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    /// I/O interruption, busy, timeout: retrying may succeed
    #[error("Transient {side} store error: {message}")]
    Transient { side: StoreSide, message: String },

    /// Schema mismatch, validation failure, corruption: retrying won't help
    #[error("Permanent {side} store error: {message}")]
    Permanent { side: StoreSide, message: String },
}

impl AdapterError {
    pub fn transient(side: StoreSide, message: impl Into<String>) -> Self {
        AdapterError::Transient {
            side,
            message: message.into(),
        }
    }

    pub fn permanent(side: StoreSide, message: impl Into<String>) -> Self {
        AdapterError::Permanent {
            side,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Transient { .. })
    }

    pub fn side(&self) -> StoreSide {
        match self {
            AdapterError::Transient { side, .. } | AdapterError::Permanent { side, .. } => *side,
        }
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Uniform write/read capability over one store
///
/// Each call is a single operation against the backing store; adapters keep
/// no cache and own no cross-store state.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    fn side(&self) -> StoreSide;

    /// Upsert `entity`. Re-applying the same payload has no further effect.
    async fn put(&self, entity: &Entity) -> AdapterResult<()>;

    async fn get(&self, kind: EntityKind, key: &EntityKey) -> AdapterResult<Option<Entity>>;

    /// Remove the entity; deleting an absent entity succeeds
    async fn delete(&self, kind: EntityKind, key: &EntityKey) -> AdapterResult<()>;
}
