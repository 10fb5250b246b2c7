//! Durable graph database: an in-memory [`GraphStore`] behind a WAL
//!
//! Every mutation is validated against the current store, appended to the
//! WAL, then applied, all under the store's write lock. Opening a database
//! replays its WAL into an empty store.

use super::property::PropertyType;
use super::schema::SchemaOp;
use super::store::{GraphStore, Mutation};
use super::wal::Wal;
use super::GraphResult;
use crate::binding::StoreBinding;
use crate::model::FieldType;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

/// Graph property type used to store a canonical field type
pub fn property_type_for(field_type: FieldType) -> PropertyType {
    match field_type {
        FieldType::Text | FieldType::Timestamp => PropertyType::String,
        FieldType::Integer => PropertyType::Integer,
        FieldType::Float => PropertyType::Double,
        FieldType::Boolean => PropertyType::Boolean,
    }
}

/// Schema declarations for a store binding: property keys, vertex labels
/// with property constraints and a unique key index, and edge labels
pub fn schema_ops(binding: &StoreBinding) -> GraphResult<Vec<SchemaOp>> {
    let keys = binding
        .property_keys()
        .map_err(|e| super::GraphError::SchemaConflict(e.to_string()))?;

    let mut ops: Vec<SchemaOp> = keys
        .into_iter()
        .map(|(name, field_type)| SchemaOp::PropertyKey {
            name,
            data_type: property_type_for(field_type),
        })
        .collect();

    for entity in binding.entities() {
        let label = entity.vertex_label.as_str();
        ops.push(SchemaOp::VertexLabel { name: label.into() });
        ops.push(SchemaOp::PropertyConstraint {
            label: label.into(),
            properties: std::iter::once(entity.key_property.clone())
                .chain(entity.fields.iter().map(|f| f.property.clone()))
                .collect(),
        });
        ops.push(SchemaOp::UniqueIndex {
            name: entity.key_index_name(),
            label: label.into(),
            property: entity.key_property.clone(),
        });
    }

    for edge_label in binding.edge_labels() {
        ops.push(SchemaOp::EdgeLabel {
            name: edge_label.into(),
        });
    }

    Ok(ops)
}

pub struct GraphDatabase {
    store: RwLock<GraphStore>,
    wal: Option<Mutex<Wal>>,
}

impl GraphDatabase {
    /// A database without a WAL; nothing survives the process
    pub fn in_memory() -> Self {
        Self {
            store: RwLock::new(GraphStore::new()),
            wal: None,
        }
    }

    /// Open the database at `path`, replaying its WAL
    pub fn open(path: impl AsRef<Path>, sync_mode: bool) -> GraphResult<Self> {
        let mut wal = Wal::new(path.as_ref())?;
        wal.set_sync_mode(sync_mode);

        let mut store = GraphStore::new();
        let mut skipped = 0usize;
        wal.replay(|mutation| {
            if let Err(e) = store.apply(mutation) {
                skipped += 1;
                warn!("Skipping WAL record that no longer applies: {}", e);
            }
        })?;

        info!(
            vertices = store.vertex_count(),
            edges = store.edge_count(),
            skipped,
            "Graph database opened at {:?}",
            path.as_ref()
        );

        Ok(Self {
            store: RwLock::new(store),
            wal: Some(Mutex::new(wal)),
        })
    }

    /// Validate, log and apply one mutation. Returns `false` for schema
    /// declarations that were already in place; those are not logged.
    pub async fn mutate(&self, mutation: Mutation) -> GraphResult<bool> {
        let mut store = self.store.write().await;
        store.validate(&mutation)?;

        if let Mutation::Schema(op) = &mutation {
            let mut probe = store.schema().clone();
            if !probe.apply(op)? {
                return Ok(false);
            }
        }

        if let Some(wal) = &self.wal {
            let mut wal = wal.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let sequence = wal.append(&mutation)?;
            debug!(sequence, "Logged graph mutation");
        }

        store.apply(mutation)?;
        Ok(true)
    }

    /// Declare the schema for `binding`. Returns the number of declarations
    /// that changed the schema.
    pub async fn setup_schema(&self, binding: &StoreBinding) -> GraphResult<usize> {
        let mut changed = 0;
        for op in schema_ops(binding)? {
            if self.mutate(Mutation::Schema(op)).await? {
                changed += 1;
            }
        }
        info!(changed, "Graph schema ready");
        Ok(changed)
    }

    /// Shared read access for lookups and traversals
    pub async fn read(&self) -> RwLockReadGuard<'_, GraphStore> {
        self.store.read().await
    }

    pub fn flush(&self) -> GraphResult<()> {
        if let Some(wal) = &self.wal {
            wal.lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::mapping::upsert_mutation;
    use crate::graph::{VertexKey, PropertyValue};
    use crate::model::{Entity, EntityKind, FieldValue};
    use tempfile::TempDir;

    fn product(key: &str, price: f64) -> Entity {
        Entity::new(EntityKind::Product, key)
            .with_field("name", "Desk Lamp")
            .with_field("price", price)
            .with_field("category", "Home & Garden")
            .with_field("brand", "BrandA")
            .with_field("sku", "SKU-000001")
            .with_field("stock_quantity", 10i64)
            .with_field("created_date", FieldValue::Timestamp(1_700_000_000_000))
            .with_field("is_active", true)
    }

    #[tokio::test]
    async fn test_setup_schema_is_idempotent() {
        let db = GraphDatabase::in_memory();
        let binding = StoreBinding::ecommerce();

        assert!(db.setup_schema(&binding).await.unwrap() > 0);
        assert_eq!(db.setup_schema(&binding).await.unwrap(), 0);
        assert_eq!(db.read().await.schema().edge_label_count(), 3);
    }

    #[tokio::test]
    async fn test_reopen_replays_wal() {
        let temp_dir = TempDir::new().unwrap();
        let binding = StoreBinding::ecommerce();
        {
            let db = GraphDatabase::open(temp_dir.path(), true).unwrap();
            db.setup_schema(&binding).await.unwrap();
            db.mutate(upsert_mutation(&binding, &product("p1", 9.99)).unwrap())
                .await
                .unwrap();
            db.mutate(upsert_mutation(&binding, &product("p1", 12.5)).unwrap())
                .await
                .unwrap();
            db.flush().unwrap();
        }

        let db = GraphDatabase::open(temp_dir.path(), true).unwrap();
        let store = db.read().await;
        assert_eq!(store.vertex_count(), 1);
        let vertex = store
            .lookup(&VertexKey::new("product", "product_id", "p1"))
            .unwrap();
        assert_eq!(vertex.get_property("price"), Some(&PropertyValue::Double(12.5)));
        drop(store);

        // Schema came back too, so re-running setup changes nothing
        assert_eq!(db.setup_schema(&binding).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejected_mutation_is_not_logged() {
        let temp_dir = TempDir::new().unwrap();
        let binding = StoreBinding::ecommerce();
        {
            let db = GraphDatabase::open(temp_dir.path(), true).unwrap();
            // No schema yet: the upsert is a schema violation
            assert!(db
                .mutate(upsert_mutation(&binding, &product("p1", 9.99)).unwrap())
                .await
                .is_err());
        }

        let db = GraphDatabase::open(temp_dir.path(), true).unwrap();
        assert_eq!(db.read().await.vertex_count(), 0);
    }
}
