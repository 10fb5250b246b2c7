//! Tabular store adapter

use super::{AdapterError, AdapterResult, StoreAdapter, StoreSide};
use crate::binding::StoreBinding;
use crate::model::{Entity, EntityKey, EntityKind};
use crate::tabular::{TableError, TabularStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub struct TabularAdapter {
    store: Arc<TabularStore>,
    binding: Arc<StoreBinding>,
}

impl TabularAdapter {
    pub fn new(store: Arc<TabularStore>, binding: Arc<StoreBinding>) -> Self {
        Self { store, binding }
    }

    pub fn store(&self) -> &Arc<TabularStore> {
        &self.store
    }
}

fn classify(error: TableError) -> AdapterError {
    if error.is_transient() {
        AdapterError::transient(StoreSide::Tabular, error.to_string())
    } else {
        AdapterError::permanent(StoreSide::Tabular, error.to_string())
    }
}

#[async_trait]
impl StoreAdapter for TabularAdapter {
    fn side(&self) -> StoreSide {
        StoreSide::Tabular
    }

    async fn put(&self, entity: &Entity) -> AdapterResult<()> {
        self.store
            .put_entity(self.binding.for_kind(entity.kind), entity)
            .map_err(classify)?;
        debug!(entity = %entity.entity_ref(), "Tabular upsert applied");
        Ok(())
    }

    async fn get(&self, kind: EntityKind, key: &EntityKey) -> AdapterResult<Option<Entity>> {
        self.store
            .get_entity(self.binding.for_kind(kind), key.as_str())
            .map_err(classify)
    }

    async fn delete(&self, kind: EntityKind, key: &EntityKey) -> AdapterResult<()> {
        self.store
            .delete_entity(self.binding.for_kind(kind), key.as_str())
            .map_err(classify)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldValue;
    use tempfile::TempDir;

    fn product(key: &str, category: &str) -> Entity {
        Entity::new(EntityKind::Product, key)
            .with_field("name", "Trail Shoe")
            .with_field("price", 89.99)
            .with_field("category", category)
            .with_field("brand", "BrandB")
            .with_field("sku", "SKU-000042")
            .with_field("stock_quantity", 3i64)
            .with_field("created_date", FieldValue::Timestamp(1_650_000_000_000))
            .with_field("is_active", true)
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let temp_dir = TempDir::new().unwrap();
        let binding = Arc::new(StoreBinding::ecommerce());
        let store = Arc::new(TabularStore::open(temp_dir.path()).unwrap());
        store.setup(&binding).unwrap();
        let adapter = TabularAdapter::new(Arc::clone(&store), binding);

        let entity = product("p1", "Sports");
        adapter.put(&entity).await.unwrap();
        adapter.put(&entity).await.unwrap();
        assert_eq!(store.count_rows("products_by_category").unwrap(), 1);
        assert_eq!(
            adapter.get(EntityKind::Product, &entity.key).await.unwrap(),
            Some(entity.clone())
        );

        adapter.delete(EntityKind::Product, &entity.key).await.unwrap();
        assert_eq!(adapter.get(EntityKind::Product, &entity.key).await.unwrap(), None);
        assert_eq!(store.count_rows("products_by_category").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_permanent() {
        let temp_dir = TempDir::new().unwrap();
        let binding = Arc::new(StoreBinding::ecommerce());
        let store = Arc::new(TabularStore::open(temp_dir.path()).unwrap());
        let adapter = TabularAdapter::new(store, binding);

        // Tables were never created
        let err = adapter.put(&product("p1", "Books")).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(err.side(), StoreSide::Tabular);
    }
}
