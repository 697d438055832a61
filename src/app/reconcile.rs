//! Reconciliation of the local cache with the authoritative server list
//!
//! A refresh fetches the "upcoming" list and rebuilds the cache from it,
//! with three exceptions that protect local knowledge:
//!
//! - a local record the server does not list yet is kept (read-after-write
//!   lag), flagged stale, and only dropped by a later refresh that still
//!   misses it once `stale_grace` has passed since it was last touched
//! - an id cancelled locally while the list was in flight, or within
//!   `stale_grace`, is never brought back by the server list
//! - when an id exists on both sides the server's version wins

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::app::cache::{CachedEntry, OwnerRecords, PersistenceAdapter, ReservationCache};
use crate::app::gateway::RemoteReservationGateway;
use crate::app::models::{CacheSnapshot, OwnerIdentity, ReservationRecord, ReservationStatus};
use crate::app::stats::EngineStats;
use crate::errors::{SyncError, SyncResult};

/// What a merge did to the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Records taken from the server list
    pub from_server: usize,
    /// Local-only records kept
    pub preserved_local: usize,
    /// Local-only records flagged stale by this merge
    pub newly_stale: usize,
    /// Stale records dropped by this merge
    pub dropped_stale: usize,
    /// Server items ignored because they were cancelled locally
    pub suppressed: usize,
}

/// Merge `server` into `records`
///
/// `since_generation` is the cache generation observed before the server
/// list was requested.
pub fn merge_authoritative(
    records: &mut OwnerRecords,
    server: Vec<ReservationRecord>,
    since_generation: u64,
    stale_grace: Duration,
    now: Instant,
) -> MergeReport {
    let mut report = MergeReport::default();
    let mut seen = HashSet::with_capacity(server.len());
    let mut merged = Vec::with_capacity(server.len() + records.len());

    for record in server {
        if records.is_tombstoned(record.id, since_generation, stale_grace, now) {
            report.suppressed += 1;
            continue;
        }
        if seen.insert(record.id) {
            merged.push(CachedEntry::fresh(record, now));
            report.from_server += 1;
        }
    }

    for entry in records.entries() {
        if seen.contains(&entry.record.id) {
            continue;
        }
        if entry.stale && now.duration_since(entry.touched_at) >= stale_grace {
            debug!("Dropping stale reservation {}", entry.record.id);
            report.dropped_stale += 1;
            continue;
        }

        let mut kept = entry.clone();
        if !kept.stale {
            kept.stale = true;
            report.newly_stale += 1;
        }
        report.preserved_local += 1;
        merged.push(kept);
    }

    records.replace(merged);
    records.prune_tombstones(since_generation, stale_grace, now);
    report
}

/// Aligns the cache with server truth
pub struct ReconciliationEngine {
    gateway: Arc<dyn RemoteReservationGateway>,
    cache: Arc<ReservationCache>,
    persistence: Option<Arc<PersistenceAdapter>>,
    stats: Arc<EngineStats>,
    stale_grace: Duration,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("stale_grace", &self.stale_grace)
            .field("persist", &self.persistence.is_some())
            .finish_non_exhaustive()
    }
}

impl ReconciliationEngine {
    pub fn new(
        gateway: Arc<dyn RemoteReservationGateway>,
        cache: Arc<ReservationCache>,
        persistence: Option<Arc<PersistenceAdapter>>,
        stats: Arc<EngineStats>,
        stale_grace: Duration,
    ) -> Self {
        Self {
            gateway,
            cache,
            persistence,
            stats,
            stale_grace,
        }
    }

    /// Fetch the upcoming list and merge it into the cache of `owner`
    ///
    /// # Errors
    ///
    /// `NoActiveOwner` if `owner` is not (or no longer) active, or the
    /// gateway failure mapped to a `SyncError`. The cache is untouched on
    /// error.
    pub async fn refresh(&self, owner: &OwnerIdentity) -> SyncResult<CacheSnapshot> {
        let since = self
            .cache
            .generation(owner)
            .await
            .ok_or(SyncError::NoActiveOwner)?;

        let items = match self
            .gateway
            .list(owner, ReservationStatus::Upcoming, None)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                self.stats.record_refresh_failure();
                return Err(SyncError::from_gateway(e));
            }
        };

        let server: Vec<ReservationRecord> = items
            .into_iter()
            .map(|item| ReservationRecord::from_remote(item, owner))
            .collect();

        let grace = self.stale_grace;
        let (report, snapshot) = self
            .cache
            .apply(owner, |records| {
                merge_authoritative(records, server, since, grace, Instant::now())
            })
            .await
            .ok_or(SyncError::NoActiveOwner)?;

        self.stats.record_refresh();
        info!(
            "Reconciled {}: {} from server, {} local kept ({} newly stale), {} dropped, {} suppressed",
            owner.key(),
            report.from_server,
            report.preserved_local,
            report.newly_stale,
            report.dropped_stale,
            report.suppressed
        );

        if let Some(persistence) = &self.persistence {
            persistence.save_best_effort(owner, &snapshot).await;
        }
        Ok(snapshot)
    }

    /// Refresh, logging and swallowing any failure
    pub async fn refresh_best_effort(&self, owner: &OwnerIdentity) -> Option<CacheSnapshot> {
        match self.refresh(owner).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Best-effort reconciliation for {} failed: {}", owner.key(), e);
                None
            }
        }
    }

    /// Fire-and-forget refresh on a background task
    pub fn spawn_refresh(self: &Arc<Self>, owner: OwnerIdentity) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.refresh_best_effort(&owner).await;
        })
    }
}
