//! Write intents: durable records of in-flight cross-store mutations
//!
//! An intent is persisted before either store is touched and moves through
//!
//! ```text
//! PENDING -> PARTIAL -> COMMITTED
//! PENDING | PARTIAL -> DIVERGENT
//! PARTIAL -> ROLLED_BACK
//! ```
//!
//! The verifier may move DIVERGENT (or a stale PENDING/PARTIAL) intent to
//! COMMITTED or ROLLED_BACK once it has reconciled the stores.

pub mod store;

pub use store::IntentStore;

use crate::adapter::StoreSide;
use crate::model::{Entity, EntityKey, EntityKind, EntityRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntentId(String);

impl IntentId {
    pub fn generate() -> Self {
        IntentId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for IntentId {
    fn from(s: &str) -> Self {
        IntentId(s.to_string())
    }
}

impl From<String> for IntentId {
    fn from(s: String) -> Self {
        IntentId(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentStatus {
    Pending,
    Partial,
    Committed,
    RolledBack,
    Divergent,
}

impl IntentStatus {
    pub const ALL: [IntentStatus; 5] = [
        IntentStatus::Pending,
        IntentStatus::Partial,
        IntentStatus::Committed,
        IntentStatus::RolledBack,
        IntentStatus::Divergent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Pending => "PENDING",
            IntentStatus::Partial => "PARTIAL",
            IntentStatus::Committed => "COMMITTED",
            IntentStatus::RolledBack => "ROLLED_BACK",
            IntentStatus::Divergent => "DIVERGENT",
        }
    }

    /// COMMITTED and ROLLED_BACK: eligible for purge after retention
    pub fn is_terminal(&self) -> bool {
        matches!(self, IntentStatus::Committed | IntentStatus::RolledBack)
    }

    /// Needs the verifier's attention once it goes stale
    pub fn is_unresolved(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IntentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        IntentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("unknown intent status {:?}", s))
    }
}

/// Value of the primary store for the key before the write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PriorState {
    /// Not captured (the read failed)
    Unknown,
    Absent,
    Present(Entity),
}

/// Durable record of one logical cross-store mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteIntent {
    pub id: IntentId,
    pub kind: EntityKind,
    pub key: EntityKey,
    /// Full entity to be written; the source of truth for repair
    pub payload: Entity,
    pub prior: PriorState,
    pub target_stores: BTreeSet<StoreSide>,
    pub status: IntentStatus,
    /// Unix milliseconds, strictly increasing within a process
    pub created_at: i64,
    pub last_attempt_at: i64,
    pub attempt_count: u32,
    /// Set on reaching a terminal status; purge after this instant
    pub retain_until: Option<i64>,
    pub last_error: Option<String>,
}

impl WriteIntent {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind, self.key.clone())
    }
}

/// Intent log errors
#[derive(Error, Debug)]
pub enum IntentError {
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Intent {0} not found")]
    NotFound(IntentId),

    /// Compare-and-set failed: the stored status was not the expected one
    #[error("Intent {id} is {actual}, expected {expected}")]
    Conflict {
        id: IntentId,
        expected: IntentStatus,
        actual: IntentStatus,
    },

    #[error("Intent {id} is {status} and cannot be deleted")]
    NotTerminal { id: IntentId, status: IntentStatus },

    #[error("Column family {0} is missing")]
    ColumnFamily(String),
}

pub type IntentResult<T> = Result<T, IntentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!("rolled-back".parse::<IntentStatus>(), Ok(IntentStatus::RolledBack));
        assert_eq!("DIVERGENT".parse::<IntentStatus>(), Ok(IntentStatus::Divergent));
        assert!("done".parse::<IntentStatus>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(IntentStatus::Committed.is_terminal());
        assert!(IntentStatus::RolledBack.is_terminal());
        assert!(IntentStatus::Divergent.is_unresolved());
        assert!(IntentStatus::Partial.is_unresolved());
    }
}
