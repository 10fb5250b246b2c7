//! Fault-injecting adapter wrapper
//!
//! Wraps any adapter and fails calls according to a shared, mutable
//! [`FaultPlan`]. Used by the failure-mode demonstrations and tests to make a
//! store flaky, reject writes, or go offline and come back.

use super::{AdapterError, AdapterResult, StoreAdapter, StoreSide};
use crate::model::{Entity, EntityKey, EntityKind};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct FaultPlan {
    offline: AtomicBool,
    transient_puts: AtomicUsize,
    reject_puts: AtomicBool,
    reject_deletes: AtomicBool,
    puts: AtomicUsize,
    gets: AtomicUsize,
    deletes: AtomicUsize,
}

impl FaultPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` puts with a transient error
    pub fn fail_puts_transiently(&self, n: usize) {
        self.transient_puts.store(n, Ordering::SeqCst);
    }

    /// Reject every put with a permanent error until healed
    pub fn fail_puts_permanently(&self) {
        self.reject_puts.store(true, Ordering::SeqCst);
    }

    /// Reject every delete with a permanent error until healed
    pub fn fail_deletes_permanently(&self) {
        self.reject_deletes.store(true, Ordering::SeqCst);
    }

    /// Fail every call transiently until healed
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    /// Clear every injected fault
    pub fn heal(&self) {
        self.offline.store(false, Ordering::SeqCst);
        self.transient_puts.store(0, Ordering::SeqCst);
        self.reject_puts.store(false, Ordering::SeqCst);
        self.reject_deletes.store(false, Ordering::SeqCst);
    }

    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn offline_error(&self, side: StoreSide) -> AdapterResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AdapterError::transient(side, "store unreachable"));
        }
        Ok(())
    }

    fn check_put(&self, side: StoreSide) -> AdapterResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.offline_error(side)?;
        if self.reject_puts.load(Ordering::SeqCst) {
            return Err(AdapterError::permanent(side, "write rejected"));
        }
        let consumed = self
            .transient_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(AdapterError::transient(side, "write timed out"));
        }
        Ok(())
    }

    fn check_get(&self, side: StoreSide) -> AdapterResult<()> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.offline_error(side)
    }

    fn check_delete(&self, side: StoreSide) -> AdapterResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.offline_error(side)?;
        if self.reject_deletes.load(Ordering::SeqCst) {
            return Err(AdapterError::permanent(side, "delete rejected"));
        }
        Ok(())
    }
}

pub struct FaultyAdapter {
    inner: Arc<dyn StoreAdapter>,
    plan: Arc<FaultPlan>,
}

impl FaultyAdapter {
    pub fn new(inner: Arc<dyn StoreAdapter>) -> Self {
        Self {
            inner,
            plan: Arc::new(FaultPlan::new()),
        }
    }

    /// Handle for changing the faults while the adapter is in use
    pub fn plan(&self) -> Arc<FaultPlan> {
        Arc::clone(&self.plan)
    }
}

#[async_trait]
impl StoreAdapter for FaultyAdapter {
    fn side(&self) -> StoreSide {
        self.inner.side()
    }

    async fn put(&self, entity: &Entity) -> AdapterResult<()> {
        if let Err(e) = self.plan.check_put(self.side()) {
            debug!(entity = %entity.entity_ref(), "Injected fault: {}", e);
            return Err(e);
        }
        self.inner.put(entity).await
    }

    async fn get(&self, kind: EntityKind, key: &EntityKey) -> AdapterResult<Option<Entity>> {
        self.plan.check_get(self.side())?;
        self.inner.get(kind, key).await
    }

    async fn delete(&self, kind: EntityKind, key: &EntityKey) -> AdapterResult<()> {
        self.plan.check_delete(self.side())?;
        self.inner.delete(kind, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::GraphAdapter;
    use crate::binding::StoreBinding;
    use crate::graph::GraphDatabase;
    use crate::model::FieldValue;

    async fn faulty() -> FaultyAdapter {
        let binding = Arc::new(StoreBinding::ecommerce());
        let db = Arc::new(GraphDatabase::in_memory());
        db.setup_schema(&binding).await.unwrap();
        FaultyAdapter::new(Arc::new(GraphAdapter::new(db, binding)))
    }

    fn user() -> Entity {
        Entity::new(EntityKind::User, "u1")
            .with_field("username", "alice")
            .with_field("email", "alice@example.com")
            .with_field("first_name", "Alice")
            .with_field("last_name", "Smith")
            .with_field("registration_date", FieldValue::Timestamp(0))
            .with_field("is_active", true)
    }

    #[tokio::test]
    async fn test_transient_failures_are_consumed() {
        let adapter = faulty().await;
        let plan = adapter.plan();
        plan.fail_puts_transiently(2);

        assert!(adapter.put(&user()).await.unwrap_err().is_transient());
        assert!(adapter.put(&user()).await.unwrap_err().is_transient());
        adapter.put(&user()).await.unwrap();
        assert_eq!(plan.put_calls(), 3);
    }

    #[tokio::test]
    async fn test_offline_and_heal() {
        let adapter = faulty().await;
        let plan = adapter.plan();
        plan.go_offline();
        assert!(adapter.get(EntityKind::User, &"u1".into()).await.is_err());
        assert!(adapter.put(&user()).await.unwrap_err().is_transient());

        plan.heal();
        adapter.put(&user()).await.unwrap();
        assert!(adapter.get(EntityKind::User, &"u1".into()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_permanent_rejection() {
        let adapter = faulty().await;
        adapter.plan().fail_puts_permanently();
        let err = adapter.put(&user()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Permanent { side: StoreSide::Graph, .. }));
    }
}
