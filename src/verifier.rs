//! Read-repair verifier
//!
//! Periodically looks at intents left PENDING, PARTIAL or DIVERGENT past a
//! grace period and converges the two stores for their entity:
//!
//! - neither store has the entity: ROLLED_BACK
//! - both stores hold the intent's payload: COMMITTED
//! - otherwise the newest intent for the entity that was not rolled back
//!   is re-driven through the coordinator's write path; older ones are
//!   superseded (ROLLED_BACK)
//! - a re-drive the primary rejects while both stores agree: ROLLED_BACK
//!
//! Each scan ends by purging terminal intents whose retention has passed.

use crate::adapter::{AdapterError, StoreSide};
use crate::coordinator::{Coordinator, WriteError};
use crate::intent::{IntentError, IntentStatus, WriteIntent};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Verifier errors
#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("Intent log error: {0}")]
    Intent(#[from] IntentError),

    #[error("Store read failed: {0}")]
    Store(#[from] AdapterError),

    #[error("Re-drive failed: {0}")]
    Write(#[from] WriteError),
}

pub type VerifierResult<T> = Result<T, VerifierError>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifierSettings {
    pub interval: Duration,
    /// Intents touched more recently than this are left alone
    pub grace: Duration,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            grace: Duration::from_secs(60),
        }
    }
}

/// Outcome counts for one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub examined: usize,
    pub committed: usize,
    pub rolled_back: usize,
    /// Re-driven to COMMITTED
    pub repaired: usize,
    pub still_divergent: usize,
    /// Older intents retired in favour of a newer one
    pub superseded: usize,
    pub failed: usize,
    /// Entity busy with a live write, or resolved by one meanwhile
    pub skipped: usize,
    pub purged: usize,
}

impl ScanReport {
    pub fn resolved(&self) -> usize {
        self.committed + self.rolled_back + self.repaired + self.superseded
    }

    /// Every examined intent lands in exactly one of these
    pub fn outcomes(&self) -> usize {
        self.resolved() + self.still_divergent + self.failed + self.skipped
    }

    pub fn is_idle(&self) -> bool {
        self.examined == 0 && self.purged == 0
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "examined={} committed={} rolled_back={} repaired={} still_divergent={} superseded={} failed={} skipped={} purged={}",
            self.examined,
            self.committed,
            self.rolled_back,
            self.repaired,
            self.still_divergent,
            self.superseded,
            self.failed,
            self.skipped,
            self.purged
        )
    }
}

enum Resolution {
    Committed,
    RolledBack,
    Repaired,
    StillDivergent,
    Superseded,
}

pub struct Verifier {
    coordinator: Coordinator,
    settings: VerifierSettings,
}

impl Verifier {
    pub fn new(coordinator: Coordinator, settings: VerifierSettings) -> Self {
        Self {
            coordinator,
            settings,
        }
    }

    pub fn settings(&self) -> &VerifierSettings {
        &self.settings
    }

    pub async fn scan_once(&self) -> VerifierResult<ScanReport> {
        self.scan_with_grace(self.settings.grace).await
    }

    /// One reconciliation pass over intents idle for at least `grace`
    pub async fn scan_with_grace(&self, grace: Duration) -> VerifierResult<ScanReport> {
        let intents = self.coordinator.intents();
        let now = intents.now();
        let cutoff = now - grace.as_millis() as i64;

        let stale: Vec<WriteIntent> = intents
            .list()?
            .into_iter()
            .filter(|i| i.status.is_unresolved() && i.last_attempt_at <= cutoff)
            .collect();

        let mut report = ScanReport::default();
        for candidate in stale {
            report.examined += 1;
            let entity = candidate.entity_ref();

            let Some(_guard) = self.coordinator.locks().try_lock(&entity) else {
                debug!(intent = %candidate.id, entity = %entity, "Entity busy, skipping");
                report.skipped += 1;
                continue;
            };

            // A write may have finished between the listing and the lock
            let intent = match intents.get(&entity, &candidate.id)? {
                Some(intent) if intent.status.is_unresolved() => intent,
                _ => {
                    debug!(intent = %candidate.id, entity = %entity, "Intent resolved concurrently");
                    report.skipped += 1;
                    continue;
                }
            };

            match self.reconcile(intent).await {
                Ok(Resolution::Committed) => report.committed += 1,
                Ok(Resolution::RolledBack) => report.rolled_back += 1,
                Ok(Resolution::Repaired) => report.repaired += 1,
                Ok(Resolution::StillDivergent) => report.still_divergent += 1,
                Ok(Resolution::Superseded) => report.superseded += 1,
                Err(e) => {
                    warn!(intent = %candidate.id, entity = %entity, "Reconciliation failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        report.purged = intents.purge_expired(now)?;

        if report.still_divergent > 0 {
            error!(count = report.still_divergent, "Entities remain divergent after repair");
        }
        Ok(report)
    }

    /// Converge one intent; the caller holds its entity's key lock
    async fn reconcile(&self, intent: WriteIntent) -> VerifierResult<Resolution> {
        let entity = intent.entity_ref();
        let graph = self
            .coordinator
            .adapter(StoreSide::Graph)
            .get(entity.kind, &entity.key)
            .await?;
        let tabular = self
            .coordinator
            .adapter(StoreSide::Tabular)
            .get(entity.kind, &entity.key)
            .await?;

        if graph.is_none() && tabular.is_none() {
            self.coordinator.settle(
                &intent,
                IntentStatus::RolledBack,
                0,
                Some("neither store holds the entity".to_string()),
            )?;
            info!(intent = %intent.id, entity = %entity, "Intent resolved as rolled back");
            return Ok(Resolution::RolledBack);
        }

        if graph == tabular && graph.as_ref() == Some(&intent.payload) {
            self.coordinator
                .settle(&intent, IntentStatus::Committed, 0, None)?;
            info!(intent = %intent.id, entity = %entity, "Intent resolved as committed");
            return Ok(Resolution::Committed);
        }

        let owner = self.coordinator.intents().latest_applicable_for(&entity)?;
        if let Some(newer) = owner.filter(|owner| owner.id != intent.id) {
            self.coordinator.settle(
                &intent,
                IntentStatus::RolledBack,
                0,
                Some(format!("superseded by intent {}", newer.id)),
            )?;
            info!(intent = %intent.id, newer = %newer.id, "Intent superseded");
            return Ok(Resolution::Superseded);
        }

        // Stores that agree were left untouched by a rejected payload
        let on_rejection = if graph == tabular {
            IntentStatus::RolledBack
        } else {
            IntentStatus::Divergent
        };
        info!(intent = %intent.id, entity = %entity, status = %intent.status, "Re-driving intent");
        match self.coordinator.drive(intent, on_rejection).await {
            Ok(_) => Ok(Resolution::Repaired),
            Err(WriteError::RolledBack { .. }) => Ok(Resolution::RolledBack),
            Err(WriteError::Divergent { .. }) => Ok(Resolution::StillDivergent),
            Err(e) => Err(e.into()),
        }
    }

    /// Scan every `interval` until `shutdown` flips to true or its sender drops
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(
            interval_ms = self.settings.interval.as_millis() as u64,
            grace_ms = self.settings.grace.as_millis() as u64,
            "Verifier started"
        );

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Verifier stopping");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    match self.scan_once().await {
                        Ok(report) if report.is_idle() => {}
                        Ok(report) => info!(%report, "Verifier scan complete"),
                        Err(e) => error!("Verifier scan failed: {}", e),
                    }
                }
            }
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display_and_totals() {
        let report = ScanReport {
            examined: 4,
            committed: 1,
            repaired: 1,
            superseded: 1,
            failed: 1,
            ..ScanReport::default()
        };
        assert_eq!(report.resolved(), 3);
        assert_eq!(report.outcomes(), report.examined);
        assert!(!report.is_idle());
        assert!(report.to_string().starts_with("examined=4 committed=1"));
        assert!(ScanReport::default().is_idle());
    }
}
