//! Embedded wide-column store
//!
//! Tables live in RocksDB column families. Base tables are keyed by entity
//! key; projection tables are keyed by partition value plus a descending
//! timestamp clustering column, so partition scans return newest rows first.

pub mod projection;
pub mod queries;
pub mod row;
pub mod schema;
pub mod storage;

pub use projection::{projection_rows, ProjectionRow};
pub use queries::TabularQueries;
pub use row::Row;
pub use schema::{tables_for, TableDef};
pub use storage::{Db, TabularStore};

use rocksdb::ErrorKind;
use thiserror::Error;

/// Tabular store errors
#[derive(Error, Debug)]
pub enum TableError {
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Table {0} already exists with a different definition")]
    SchemaConflict(String),

    #[error("Unknown column {column} in table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("Missing column {column} in table {table}")]
    MissingColumn { table: String, column: String },

    #[error("Column {column} in table {table} expects {expected} but got {found}")]
    TypeMismatch {
        table: String,
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid row key: {0}")]
    InvalidKey(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl TableError {
    /// Whether retrying the same operation may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            TableError::RocksDb(e) => matches!(
                e.kind(),
                ErrorKind::Busy
                    | ErrorKind::TimedOut
                    | ErrorKind::TryAgain
                    | ErrorKind::Incomplete
                    | ErrorKind::IOError
            ),
            _ => false,
        }
    }
}

pub type TableResult<T> = Result<T, TableError>;
