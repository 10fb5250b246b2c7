//! Dualstore
//!
//! Keeps one e-commerce record set (users, products, orders, reviews) in two
//! differently shaped stores and writes to both through a coordinator with
//! defined failure semantics.
//!
//! # Architecture
//!
//! - `model`: canonical entities and validated domain records
//! - `binding`: how each entity kind maps onto vertices and tables
//! - `graph`: embedded property graph with schema, WAL and traversals
//! - `tabular`: RocksDB wide-column tables with denormalized projections
//! - `adapter`: uniform put/get/delete over either store, with
//!   transient/permanent error classification
//! - `intent`: durable write intents with compare-and-set transitions
//! - `coordinator`: intent-first dual writes with retry and compensation
//! - `verifier`: background reconciliation of unresolved intents
//! - `generator`: seeded synthetic data
//! - `config`, `system`: configuration and store bootstrap
//!
//! ## Example Usage
//!
//! ```no_run
//! use dualstore::coordinator::CoordinatorSettings;
//! use dualstore::model::{Entity, EntityKind, FieldValue};
//! use dualstore::system::DualStore;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let stores = DualStore::open("./dualstore_data", false)?;
//! stores.setup_graph_schema().await?;
//! let coordinator = stores.coordinator(CoordinatorSettings::default());
//!
//! let alice = Entity::new(EntityKind::User, "u1")
//!     .with_field("username", "alice")
//!     .with_field("email", "alice@example.com")
//!     .with_field("first_name", "Alice")
//!     .with_field("last_name", "Smith")
//!     .with_field("registration_date", FieldValue::Timestamp(1_600_000_000_000))
//!     .with_field("is_active", true);
//!
//! let committed = coordinator.write(alice.clone()).await?;
//! assert_eq!(coordinator.read(EntityKind::User, &alice.key).await?, Some(alice));
//! println!("committed as intent {}", committed.intent_id);
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod binding;
pub mod config;
pub mod coordinator;
pub mod generator;
pub mod graph;
pub mod intent;
pub mod model;
pub mod system;
pub mod tabular;
pub mod verifier;

// Re-export main types for convenience
pub use adapter::{AdapterError, AdapterResult, StoreAdapter, StoreSide};
pub use binding::StoreBinding;
pub use config::{AppConfig, ConfigError};
pub use coordinator::{CommitResult, Coordinator, CoordinatorSettings, RetryPolicy, WriteError};
pub use generator::{DataGenerator, Dataset};
pub use intent::{IntentId, IntentStatus, IntentStore, WriteIntent};
pub use model::{Entity, EntityKey, EntityKind, EntityRef, FieldValue};
pub use system::{DualStore, SystemError};
pub use verifier::{ScanReport, Verifier, VerifierSettings};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.1.0");
    }
}
