//! Dual-write coordinator
//!
//! Gives one logical mutation defined failure semantics across the graph and
//! tabular stores. Every write is recorded as a PENDING intent before either
//! store is touched, then applied to the primary store (A) and the secondary
//! store (B) in that order:
//!
//! ```text
//! PENDING --A ok--> PARTIAL --B ok--> COMMITTED
//!    |                 |
//!    | A fails         | B rejects: restore A's prior value
//!    v                 v
//! DIVERGENT        ROLLED_BACK (or DIVERGENT if the restore fails)
//! ```
//!
//! Transient adapter failures are retried with capped exponential backoff.
//! Writes to the same entity are serialized through [`KeyLocks`]; writes to
//! different entities run concurrently.

pub mod locks;
pub mod outcome;
pub mod retry;

pub use locks::KeyLocks;
pub use outcome::{CommitResult, WriteError};
pub use retry::RetryPolicy;

use crate::adapter::{AdapterError, AdapterResult, StoreAdapter, StoreSide};
use crate::intent::{IntentId, IntentResult, IntentStatus, IntentStore, PriorState, WriteIntent};
use crate::model::{Entity, EntityKey, EntityKind};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Coordinator tuning
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    /// Store written first (store A)
    pub primary: StoreSide,
    pub retry: RetryPolicy,
    /// Default deadline for [`Coordinator::write`]
    pub write_timeout: Duration,
    /// How long terminal intents are kept before the verifier purges them
    pub retention: Duration,
    /// Compensate store A when store B stays unreachable past the retry
    /// budget, instead of leaving the intent DIVERGENT for the verifier
    pub compensate_on_exhaustion: bool,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            primary: StoreSide::Graph,
            retry: RetryPolicy::default(),
            write_timeout: Duration::from_secs(10),
            retention: Duration::from_secs(3600),
            compensate_on_exhaustion: false,
        }
    }
}

struct Inner {
    graph: Arc<dyn StoreAdapter>,
    tabular: Arc<dyn StoreAdapter>,
    intents: Arc<IntentStore>,
    locks: KeyLocks,
    settings: CoordinatorSettings,
}

/// Cheap to clone; clones share adapters, intent log and key locks
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    pub fn new(
        graph: Arc<dyn StoreAdapter>,
        tabular: Arc<dyn StoreAdapter>,
        intents: Arc<IntentStore>,
        settings: CoordinatorSettings,
    ) -> Self {
        info!(
            primary = %settings.primary,
            max_attempts = settings.retry.max_attempts,
            "Coordinator ready"
        );
        Self {
            inner: Arc::new(Inner {
                graph,
                tabular,
                intents,
                locks: KeyLocks::new(),
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.inner.settings
    }

    pub fn intents(&self) -> &Arc<IntentStore> {
        &self.inner.intents
    }

    pub fn locks(&self) -> &KeyLocks {
        &self.inner.locks
    }

    pub fn adapter(&self, side: StoreSide) -> &Arc<dyn StoreAdapter> {
        match side {
            StoreSide::Graph => &self.inner.graph,
            StoreSide::Tabular => &self.inner.tabular,
        }
    }

    /// (store A, store B)
    fn stores(&self) -> (&Arc<dyn StoreAdapter>, &Arc<dyn StoreAdapter>) {
        let primary = self.inner.settings.primary;
        (self.adapter(primary), self.adapter(primary.other()))
    }

    fn targets() -> BTreeSet<StoreSide> {
        BTreeSet::from([StoreSide::Graph, StoreSide::Tabular])
    }

    /// Write `entity` to both stores under the configured deadline
    pub async fn write(&self, entity: Entity) -> Result<CommitResult, WriteError> {
        let timeout = self.inner.settings.write_timeout;
        self.write_with_timeout(entity, timeout).await
    }

    /// Write `entity` to both stores; succeeds only once the intent is
    /// COMMITTED. On timeout the intent is left where it got to.
    pub async fn write_with_timeout(
        &self,
        entity: Entity,
        timeout: Duration,
    ) -> Result<CommitResult, WriteError> {
        if entity.key.is_empty() {
            return Err(WriteError::InvalidEntity(format!(
                "{} entity has an empty key",
                entity.kind
            )));
        }

        let intent_id = IntentId::generate();
        let entity_ref = entity.entity_ref();
        match tokio::time::timeout(timeout, self.write_locked(intent_id.clone(), entity)).await {
            Ok(result) => result,
            Err(_) => {
                let status = self
                    .inner
                    .intents
                    .get(&entity_ref, &intent_id)?
                    .map(|intent| intent.status);
                warn!(
                    intent = %intent_id,
                    entity = %entity_ref,
                    timeout_ms = timeout.as_millis() as u64,
                    "Write timed out"
                );
                Err(WriteError::TimedOut { intent_id, status })
            }
        }
    }

    async fn write_locked(
        &self,
        intent_id: IntentId,
        entity: Entity,
    ) -> Result<CommitResult, WriteError> {
        let entity_ref = entity.entity_ref();
        let _guard = self.inner.locks.lock(&entity_ref).await;

        let intent = self
            .inner
            .intents
            .create(intent_id, entity, Self::targets())?;

        let (store_a, _) = self.stores();
        let (read, _) = self
            .inner
            .settings
            .retry
            .run("prior read", || store_a.get(entity_ref.kind, &entity_ref.key))
            .await;
        let prior = match read {
            Ok(Some(existing)) => PriorState::Present(existing),
            Ok(None) => PriorState::Absent,
            Err(e) => {
                warn!(intent = %intent.id, "Could not capture prior value: {}", e);
                PriorState::Unknown
            }
        };
        let intent = self
            .inner
            .intents
            .transition(&intent, IntentStatus::Pending, |i| i.prior = prior)?;

        self.drive(intent, IntentStatus::Divergent).await
    }

    /// Apply the intent's payload to store A then store B, moving the intent
    /// through its states. The caller must hold the entity's key lock.
    ///
    /// `on_rejection` is where the intent settles when store A refuses the
    /// payload permanently: DIVERGENT for a fresh write, ROLLED_BACK when
    /// the caller knows both stores already agree.
    pub(crate) async fn drive(
        &self,
        intent: WriteIntent,
        on_rejection: IntentStatus,
    ) -> Result<CommitResult, WriteError> {
        let (store_a, store_b) = self.stores();
        let retry = self.inner.settings.retry;
        let payload = intent.payload.clone();

        let (result, attempts) = retry.run("primary put", || store_a.put(&payload)).await;
        if let Err(e) = result {
            let reason = e.to_string();
            error!(intent = %intent.id, store = %e.side(), attempts, "Primary write failed: {}", reason);
            if !e.is_transient() && on_rejection == IntentStatus::RolledBack {
                self.settle(&intent, IntentStatus::RolledBack, attempts, Some(reason.clone()))?;
                return Err(WriteError::RolledBack {
                    intent_id: intent.id,
                    reason,
                });
            }
            self.settle(&intent, IntentStatus::Divergent, attempts, Some(reason.clone()))?;
            return Err(WriteError::Divergent {
                intent_id: intent.id,
                reason,
            });
        }
        let intent = self.settle(&intent, IntentStatus::Partial, attempts, None)?;

        let (result, attempts) = retry.run("secondary put", || store_b.put(&payload)).await;
        match result {
            Ok(()) => {
                let intent = self.settle(&intent, IntentStatus::Committed, attempts, None)?;
                info!(intent = %intent.id, entity = %intent.entity_ref(), "Write committed");
                Ok(CommitResult {
                    status: IntentStatus::Committed,
                    intent_id: intent.id,
                })
            }
            Err(e) if e.is_transient() && !self.inner.settings.compensate_on_exhaustion => {
                let reason = e.to_string();
                error!(
                    intent = %intent.id,
                    store = %e.side(),
                    attempts,
                    "Secondary store unreachable, leaving intent for the verifier: {}",
                    reason
                );
                self.settle(&intent, IntentStatus::Divergent, attempts, Some(reason.clone()))?;
                Err(WriteError::Divergent {
                    intent_id: intent.id,
                    reason,
                })
            }
            Err(e) => self.compensate(intent, attempts, e).await,
        }
    }

    /// Undo store A: put back the prior value, or delete if there was none
    async fn compensate(
        &self,
        intent: WriteIntent,
        attempts: u32,
        cause: AdapterError,
    ) -> Result<CommitResult, WriteError> {
        let (store_a, _) = self.stores();
        let retry = self.inner.settings.retry;
        let entity = intent.entity_ref();
        warn!(intent = %intent.id, "Secondary write failed, compensating: {}", cause);

        let (restored, undo_attempts): (AdapterResult<()>, u32) = match &intent.prior {
            PriorState::Present(prior) => retry.run("compensating put", || store_a.put(prior)).await,
            PriorState::Absent => {
                retry
                    .run("compensating delete", || store_a.delete(entity.kind, &entity.key))
                    .await
            }
            PriorState::Unknown => (
                Err(AdapterError::permanent(
                    store_a.side(),
                    "prior value was never captured",
                )),
                0,
            ),
        };
        let attempts = attempts + undo_attempts;

        match restored {
            Ok(()) => {
                let reason = cause.to_string();
                self.settle(&intent, IntentStatus::RolledBack, attempts, Some(reason.clone()))?;
                info!(intent = %intent.id, entity = %entity, "Write rolled back");
                Err(WriteError::RolledBack {
                    intent_id: intent.id,
                    reason,
                })
            }
            Err(e) => {
                let reason = format!("{}; compensation failed: {}", cause, e);
                error!(intent = %intent.id, entity = %entity, "{}", reason);
                self.settle(&intent, IntentStatus::Divergent, attempts, Some(reason.clone()))?;
                Err(WriteError::Divergent {
                    intent_id: intent.id,
                    reason,
                })
            }
        }
    }

    /// Move `intent` from its current status to `status`, recording the attempt
    pub(crate) fn settle(
        &self,
        intent: &WriteIntent,
        status: IntentStatus,
        attempts: u32,
        last_error: Option<String>,
    ) -> IntentResult<WriteIntent> {
        let intents = &self.inner.intents;
        let now = intents.now();
        let retention = self.inner.settings.retention.as_millis() as i64;
        intents.transition(intent, intent.status, |i| {
            i.status = status;
            i.attempt_count += attempts;
            i.last_attempt_at = now;
            i.last_error = last_error;
            i.retain_until = status.is_terminal().then(|| now + retention);
        })
    }

    /// Read an entity: tabular store first, graph store on a miss or error
    pub async fn read(&self, kind: EntityKind, key: &EntityKey) -> AdapterResult<Option<Entity>> {
        match self.inner.tabular.get(kind, key).await {
            Ok(Some(entity)) => return Ok(Some(entity)),
            Ok(None) => debug!(kind = %kind, key = %key, "Tabular miss, trying graph"),
            Err(e) => warn!(kind = %kind, key = %key, "Tabular read failed, trying graph: {}", e),
        }
        self.inner.graph.get(kind, key).await
    }

    pub fn intent(&self, id: &IntentId) -> IntentResult<Option<WriteIntent>> {
        self.inner.intents.find(id)
    }

    /// Report intents a previous run left unresolved; returns how many.
    /// The verifier converges them once their grace period passes.
    pub fn recover(&self) -> IntentResult<usize> {
        let counts = self.inner.intents.count_by_status()?;
        let mut unresolved = 0;
        for status in IntentStatus::ALL.iter().filter(|s| s.is_unresolved()) {
            let count = counts.get(status.as_str()).copied().unwrap_or(0);
            if count > 0 {
                warn!(status = %status, count, "Unresolved intents from a previous run");
            }
            unresolved += count;
        }
        if unresolved == 0 {
            info!("No in-flight intents to recover");
        }
        Ok(unresolved)
    }
}
