//! Graph store adapter

use super::{AdapterError, AdapterResult, StoreAdapter, StoreSide};
use crate::binding::StoreBinding;
use crate::graph::mapping::{to_entity, upsert_mutation, vertex_key};
use crate::graph::{GraphDatabase, GraphError, Mutation, WalError};
use crate::model::{Entity, EntityKey, EntityKind};
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tracing::debug;

pub struct GraphAdapter {
    db: Arc<GraphDatabase>,
    binding: Arc<StoreBinding>,
}

impl GraphAdapter {
    pub fn new(db: Arc<GraphDatabase>, binding: Arc<StoreBinding>) -> Self {
        Self { db, binding }
    }

    pub fn database(&self) -> &Arc<GraphDatabase> {
        &self.db
    }
}

/// WAL I/O that was interrupted may succeed on retry; everything else
/// (schema violations, mapping errors, corruption) will not
fn classify(error: GraphError) -> AdapterError {
    let transient = match &error {
        GraphError::Wal(WalError::Io(e)) => matches!(
            e.kind(),
            io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
        ),
        _ => false,
    };
    if transient {
        AdapterError::transient(StoreSide::Graph, error.to_string())
    } else {
        AdapterError::permanent(StoreSide::Graph, error.to_string())
    }
}

#[async_trait]
impl StoreAdapter for GraphAdapter {
    fn side(&self) -> StoreSide {
        StoreSide::Graph
    }

    async fn put(&self, entity: &Entity) -> AdapterResult<()> {
        let mutation = upsert_mutation(&self.binding, entity).map_err(classify)?;
        self.db.mutate(mutation).await.map_err(classify)?;
        debug!(entity = %entity.entity_ref(), "Graph upsert applied");
        Ok(())
    }

    async fn get(&self, kind: EntityKind, key: &EntityKey) -> AdapterResult<Option<Entity>> {
        let store = self.db.read().await;
        match store.lookup(&vertex_key(&self.binding, kind, key.as_str())) {
            Some(vertex) => to_entity(&self.binding, kind, vertex)
                .map(Some)
                .map_err(classify),
            None => Ok(None),
        }
    }

    async fn delete(&self, kind: EntityKind, key: &EntityKey) -> AdapterResult<()> {
        let mutation = Mutation::DropVertex {
            key: vertex_key(&self.binding, kind, key.as_str()),
        };
        self.db.mutate(mutation).await.map_err(classify)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldValue;

    async fn adapter() -> GraphAdapter {
        let binding = Arc::new(StoreBinding::ecommerce());
        let db = Arc::new(GraphDatabase::in_memory());
        db.setup_schema(&binding).await.unwrap();
        GraphAdapter::new(db, binding)
    }

    fn review(key: &str) -> Entity {
        Entity::new(EntityKind::Review, key)
            .with_field("product_id", "p1")
            .with_field("user_id", "u1")
            .with_field("rating", 4i64)
            .with_field("title", "Solid")
            .with_field("review_date", FieldValue::Timestamp(1_700_000_000_000))
            .with_field("is_verified_purchase", false)
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let adapter = adapter().await;
        let entity = review("r1");

        adapter.put(&entity).await.unwrap();
        adapter.put(&entity).await.unwrap();
        assert_eq!(
            adapter.get(EntityKind::Review, &entity.key).await.unwrap(),
            Some(entity.clone())
        );

        adapter.delete(EntityKind::Review, &entity.key).await.unwrap();
        adapter.delete(EntityKind::Review, &entity.key).await.unwrap();
        assert_eq!(adapter.get(EntityKind::Review, &entity.key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mapping_failure_is_permanent() {
        let adapter = adapter().await;
        let bad = review("r2").with_field("rating", "five");
        let err = adapter.put(&bad).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(err.side(), StoreSide::Graph);
    }

    #[tokio::test]
    async fn test_missing_schema_is_permanent() {
        let binding = Arc::new(StoreBinding::ecommerce());
        let adapter = GraphAdapter::new(Arc::new(GraphDatabase::in_memory()), binding);
        let err = adapter.put(&review("r3")).await.unwrap_err();
        assert!(matches!(err, AdapterError::Permanent { .. }));
    }
}
