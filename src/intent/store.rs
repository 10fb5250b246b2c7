//! Durable intent log in the `write_intents` column family
//!
//! Row key `{kind}:{entity_key}:{intent_id}` keeps all intents of one entity
//! together. Status changes go through [`IntentStore::transition`], a
//! compare-and-set serialized by a store-wide mutex.

use super::{
    IntentError, IntentId, IntentResult, IntentStatus, PriorState, WriteIntent,
};
use crate::adapter::StoreSide;
use crate::model::{Entity, EntityRef};
use crate::tabular::{Db, TabularStore};
use rocksdb::{BoundColumnFamily, Direction, IteratorMode};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub const INTENT_CF: &str = "write_intents";

pub struct IntentStore {
    db: Arc<Db>,
    /// Serializes compare-and-set transitions
    lock: Mutex<()>,
    /// Last timestamp handed out
    clock: AtomicI64,
}

impl IntentStore {
    /// Open the intent log inside the tabular store's RocksDB instance
    pub fn open(tabular: &TabularStore) -> IntentResult<Self> {
        tabular
            .ensure_column_family(INTENT_CF)
            .map_err(|e| IntentError::ColumnFamily(format!("{}: {}", INTENT_CF, e)))?;

        let store = Self {
            db: tabular.db(),
            lock: Mutex::new(()),
            clock: AtomicI64::new(0),
        };

        let existing = store.list()?;
        let latest = existing.iter().map(|i| i.created_at).max().unwrap_or(0);
        store.clock.store(latest, Ordering::SeqCst);

        info!(intents = existing.len(), "Intent log opened");
        Ok(store)
    }

    /// Wall-clock milliseconds, strictly increasing across calls
    pub fn now(&self) -> i64 {
        let wall = chrono::Utc::now().timestamp_millis();
        match self
            .clock
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(wall.max(last + 1))
            }) {
            Ok(last) | Err(last) => wall.max(last + 1),
        }
    }

    fn cf(&self) -> IntentResult<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(INTENT_CF)
            .ok_or_else(|| IntentError::ColumnFamily(INTENT_CF.to_string()))
    }

    fn entity_prefix(entity: &EntityRef) -> String {
        format!("{}:{}:", entity.kind, entity.key)
    }

    fn row_key(entity: &EntityRef, id: &IntentId) -> String {
        format!("{}{}", Self::entity_prefix(entity), id)
    }

    fn write(&self, intent: &WriteIntent) -> IntentResult<()> {
        let key = Self::row_key(&intent.entity_ref(), &intent.id);
        self.db
            .put_cf(&self.cf()?, key.as_bytes(), bincode::serialize(intent)?)?;
        Ok(())
    }

    /// Persist a new PENDING intent for `payload`
    pub fn create(
        &self,
        id: IntentId,
        payload: Entity,
        target_stores: BTreeSet<StoreSide>,
    ) -> IntentResult<WriteIntent> {
        let now = self.now();
        let intent = WriteIntent {
            id,
            kind: payload.kind,
            key: payload.key.clone(),
            payload,
            prior: PriorState::Unknown,
            target_stores,
            status: IntentStatus::Pending,
            created_at: now,
            last_attempt_at: now,
            attempt_count: 0,
            retain_until: None,
            last_error: None,
        };
        self.write(&intent)?;
        debug!(intent = %intent.id, entity = %intent.entity_ref(), "Intent created");
        Ok(intent)
    }

    pub fn get(&self, entity: &EntityRef, id: &IntentId) -> IntentResult<Option<WriteIntent>> {
        let key = Self::row_key(entity, id);
        match self.db.get_cf(&self.cf()?, key.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Look an intent up by id alone (full scan)
    pub fn find(&self, id: &IntentId) -> IntentResult<Option<WriteIntent>> {
        Ok(self.list()?.into_iter().find(|i| &i.id == id))
    }

    /// Atomically move `intent` from `expected` to whatever `update` sets.
    /// Fails with `Conflict` if the stored status is not `expected`.
    pub fn transition<F>(
        &self,
        intent: &WriteIntent,
        expected: IntentStatus,
        update: F,
    ) -> IntentResult<WriteIntent>
    where
        F: FnOnce(&mut WriteIntent),
    {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());

        let mut current = self
            .get(&intent.entity_ref(), &intent.id)?
            .ok_or_else(|| IntentError::NotFound(intent.id.clone()))?;
        if current.status != expected {
            return Err(IntentError::Conflict {
                id: current.id,
                expected,
                actual: current.status,
            });
        }

        update(&mut current);
        self.write(&current)?;

        debug!(
            intent = %current.id,
            from = %expected,
            to = %current.status,
            "Intent transition"
        );
        Ok(current)
    }

    fn scan(&self, prefix: &[u8]) -> IntentResult<Vec<WriteIntent>> {
        let cf = self.cf()?;
        let mut intents = Vec::new();
        for item in self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            intents.push(bincode::deserialize::<WriteIntent>(&value)?);
        }
        Ok(intents)
    }

    pub fn list(&self) -> IntentResult<Vec<WriteIntent>> {
        let mut intents = self.scan(&[])?;
        intents.sort_by_key(|i| i.created_at);
        Ok(intents)
    }

    pub fn list_by_status(&self, status: IntentStatus) -> IntentResult<Vec<WriteIntent>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|i| i.status == status)
            .collect())
    }

    /// Intents recorded for one entity, oldest first
    pub fn intents_for(&self, entity: &EntityRef) -> IntentResult<Vec<WriteIntent>> {
        let prefix = Self::entity_prefix(entity);
        let mut intents: Vec<WriteIntent> = self
            .scan(prefix.as_bytes())?
            .into_iter()
            .filter(|i| i.kind == entity.kind && i.key == entity.key)
            .collect();
        intents.sort_by_key(|i| i.created_at);
        Ok(intents)
    }

    /// The newest intent for an entity
    pub fn latest_for(&self, entity: &EntityRef) -> IntentResult<Option<WriteIntent>> {
        Ok(self.intents_for(entity)?.pop())
    }

    /// The newest intent for an entity that has not been rolled back.
    /// A rolled-back intent applied nothing, so it cannot stand in for an
    /// older one that did.
    pub fn latest_applicable_for(&self, entity: &EntityRef) -> IntentResult<Option<WriteIntent>> {
        Ok(self
            .intents_for(entity)?
            .into_iter()
            .rev()
            .find(|i| i.status != IntentStatus::RolledBack))
    }

    pub fn count_by_status(&self) -> IntentResult<BTreeMap<&'static str, usize>> {
        let mut counts = BTreeMap::new();
        for intent in self.list()? {
            *counts.entry(intent.status.as_str()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Remove a COMMITTED or ROLLED_BACK intent
    pub fn delete(&self, intent: &WriteIntent) -> IntentResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let current = self
            .get(&intent.entity_ref(), &intent.id)?
            .ok_or_else(|| IntentError::NotFound(intent.id.clone()))?;
        if !current.status.is_terminal() {
            return Err(IntentError::NotTerminal {
                id: current.id,
                status: current.status,
            });
        }
        let key = Self::row_key(&intent.entity_ref(), &intent.id);
        self.db.delete_cf(&self.cf()?, key.as_bytes())?;
        Ok(())
    }

    /// Delete terminal intents whose retention has passed; returns how many
    pub fn purge_expired(&self, now: i64) -> IntentResult<usize> {
        let mut purged = 0;
        for intent in self.list()? {
            let expired = intent.status.is_terminal()
                && intent.retain_until.map(|t| t <= now).unwrap_or(false);
            if expired {
                self.delete(&intent)?;
                purged += 1;
            }
        }
        if purged > 0 {
            info!(purged, "Purged expired intents");
        }
        Ok(purged)
    }
}
