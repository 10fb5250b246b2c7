//! Per-entity async locks

use crate::model::EntityRef;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Unused entries are pruned once the table grows past this size
const PRUNE_THRESHOLD: usize = 1024;

/// Serializes work on the same entity; different entities never contend
#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<EntityRef, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `entity`
    pub async fn lock(&self, entity: &EntityRef) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            if locks.len() > PRUNE_THRESHOLD {
                // Only the table references an idle lock
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(entity.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Non-blocking attempt, used by the verifier to skip busy entities
    pub fn try_lock(&self, entity: &EntityRef) -> Option<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(locks.entry(entity.clone()).or_default())
        };
        lock.try_lock_owned().ok()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = Arc::new(KeyLocks::new());
        let entity = EntityRef::new(EntityKind::User, "u1");

        let guard = locks.lock(&entity).await;
        assert!(locks.try_lock(&entity).is_none());

        let other = EntityRef::new(EntityKind::User, "u2");
        assert!(locks.try_lock(&other).is_some());

        let waiter = {
            let locks = Arc::clone(&locks);
            let entity = entity.clone();
            tokio::spawn(async move {
                let _g = locks.lock(&entity).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert!(locks.try_lock(&entity).is_some());
    }
}
