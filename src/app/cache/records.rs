//! Owner-scoped in-memory record collection
//!
//! [`ReservationCache`] is the single source of truth for the current
//! process. Every change goes through [`ReservationCache::apply`], which takes
//! the lock, runs the edit, and publishes the resulting snapshot before the
//! lock is released. Observers therefore only ever see whole edits, in the
//! order they were applied.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::app::broadcast::ChangeBroadcaster;
use crate::app::models::{CacheSnapshot, OwnerIdentity, ReservationRecord};

/// A cached record plus the bookkeeping reconciliation needs
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub record: ReservationRecord,
    /// Last time the record was inserted or confirmed by the server
    pub touched_at: Instant,
    /// Missing from the most recent authoritative refresh
    pub stale: bool,
}

impl CachedEntry {
    pub fn fresh(record: ReservationRecord, now: Instant) -> Self {
        Self {
            record,
            touched_at: now,
            stale: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Tombstone {
    generation: u64,
    removed_at: Instant,
}

/// Records of the active owner, mutable only inside [`ReservationCache::apply`]
#[derive(Debug, Default)]
pub struct OwnerRecords {
    entries: Vec<CachedEntry>,
    tombstones: HashMap<i64, Tombstone>,
    generation: u64,
}

impl OwnerRecords {
    /// Mutation counter, bumped after every applied edit
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn entries(&self) -> &[CachedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.entries.iter().any(|e| e.record.id == id)
    }

    pub fn get(&self, id: i64) -> Option<&ReservationRecord> {
        self.entries
            .iter()
            .find(|e| e.record.id == id)
            .map(|e| &e.record)
    }

    /// Insert `record`, replacing any entry with the same id
    pub fn upsert(&mut self, record: ReservationRecord, now: Instant) {
        let id = record.id;
        self.entries.retain(|e| e.record.id != id);
        self.tombstones.remove(&id);
        self.entries.push(CachedEntry::fresh(record, now));
    }

    /// Insert `record` only if its id is not cached yet
    pub fn insert_if_absent(&mut self, record: ReservationRecord, now: Instant) -> bool {
        if self.contains(record.id) || self.tombstones.contains_key(&record.id) {
            return false;
        }
        self.entries.push(CachedEntry::fresh(record, now));
        true
    }

    /// Remove the record with `id`, leaving a tombstone for in-flight refreshes
    pub fn remove(&mut self, id: i64, now: Instant) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.record.id != id);
        self.tombstones.insert(
            id,
            Tombstone {
                generation: self.generation,
                removed_at: now,
            },
        );
        self.entries.len() != before
    }

    /// Whether `id` was removed recently enough that a server list must not
    /// bring it back
    ///
    /// A removal counts if it happened at or after `since_generation` (the
    /// list was fetched before it) or less than `grace` ago (the server read
    /// path may still lag behind the cancel).
    pub fn is_tombstoned(&self, id: i64, since_generation: u64, grace: Duration, now: Instant) -> bool {
        self.tombstones.get(&id).is_some_and(|t| {
            t.generation >= since_generation || now.duration_since(t.removed_at) < grace
        })
    }

    /// Forget tombstones that can no longer matter to any refresh
    pub fn prune_tombstones(&mut self, before_generation: u64, grace: Duration, now: Instant) {
        self.tombstones.retain(|_, t| {
            t.generation >= before_generation || now.duration_since(t.removed_at) < grace
        });
    }

    /// Replace all entries
    pub fn replace(&mut self, entries: Vec<CachedEntry>) {
        self.entries = entries;
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.tombstones.clear();
    }

    /// Records ordered by start time (unscheduled last), then id
    pub fn sorted_records(&self) -> Vec<ReservationRecord> {
        let mut records: Vec<ReservationRecord> =
            self.entries.iter().map(|e| e.record.clone()).collect();
        records.sort_by(|a, b| {
            (a.start_at.is_none(), a.start_at, a.id).cmp(&(b.start_at.is_none(), b.start_at, b.id))
        });
        records
    }
}

#[derive(Debug, Default)]
struct CacheState {
    owner: Option<OwnerIdentity>,
    records: OwnerRecords,
    version: u64,
}

impl CacheState {
    fn snapshot(&self) -> CacheSnapshot {
        match &self.owner {
            Some(owner) => CacheSnapshot::new(
                Some(owner.key()),
                self.version,
                self.records
                    .sorted_records()
                    .into_iter()
                    .filter(|r| r.is_owned_by(owner))
                    .collect(),
            ),
            None => CacheSnapshot::empty(self.version),
        }
    }

    fn is_active(&self, owner: &OwnerIdentity) -> bool {
        self.owner.as_ref() == Some(owner)
    }
}

/// Result of [`ReservationCache::switch_to`]
#[derive(Debug, Clone)]
pub struct Activation {
    /// First snapshot published for the owner
    pub snapshot: CacheSnapshot,
    /// Owner that was active before, if the owner changed
    pub previous: Option<OwnerIdentity>,
    /// False when the owner was already active
    pub changed: bool,
}

/// The owner-scoped ordered collection of booking records
#[derive(Debug)]
pub struct ReservationCache {
    state: Mutex<CacheState>,
    broadcaster: Arc<ChangeBroadcaster>,
}

impl ReservationCache {
    pub fn new(broadcaster: Arc<ChangeBroadcaster>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            broadcaster,
        }
    }

    /// Make `owner` the active owner
    ///
    /// Switching owners drops every record of the previous owner before the
    /// new owner's first snapshot is published.
    pub async fn activate(&self, owner: &OwnerIdentity) -> CacheSnapshot {
        self.switch_to(owner).await.snapshot
    }

    /// Make `owner` the active owner and report whom it replaced
    ///
    /// The check against the current owner and the switch happen under one
    /// lock, so concurrent switches each see the owner they displaced.
    pub async fn switch_to(&self, owner: &OwnerIdentity) -> Activation {
        let mut state = self.state.lock().await;
        let changed = !state.is_active(owner);
        let mut previous = None;
        if changed {
            previous = state.owner.replace(owner.clone());
            if let Some(previous) = &previous {
                info!("Switching owner {} -> {}", previous.key(), owner.key());
            }
            state.records.clear();
        }
        Activation {
            snapshot: self.publish_locked(&mut state),
            previous,
            changed,
        }
    }

    /// Drop the active owner and all in-memory records
    pub async fn deactivate(&self) -> CacheSnapshot {
        let mut state = self.state.lock().await;
        if let Some(owner) = state.owner.take() {
            info!("Deactivated owner {}", owner.key());
        }
        state.records.clear();
        self.publish_locked(&mut state)
    }

    pub async fn active_owner(&self) -> Option<OwnerIdentity> {
        self.state.lock().await.owner.clone()
    }

    /// Immutable copy of the current state
    pub async fn snapshot(&self) -> CacheSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Whether `owner` is active and has a record with `id`
    pub async fn contains(&self, owner: &OwnerIdentity, id: i64) -> bool {
        let state = self.state.lock().await;
        state.is_active(owner) && state.records.contains(id)
    }

    /// Current mutation generation, or `None` if `owner` is not active
    pub async fn generation(&self, owner: &OwnerIdentity) -> Option<u64> {
        let state = self.state.lock().await;
        state.is_active(owner).then(|| state.records.generation())
    }

    /// Run `edit` against the records of `owner` and publish the result
    ///
    /// Returns `None` without running `edit` if `owner` is no longer the
    /// active owner.
    pub async fn apply<R>(
        &self,
        owner: &OwnerIdentity,
        edit: impl FnOnce(&mut OwnerRecords) -> R,
    ) -> Option<(R, CacheSnapshot)> {
        let mut state = self.state.lock().await;
        if !state.is_active(owner) {
            debug!("Skipping cache edit for inactive owner {}", owner.key());
            return None;
        }

        let result = edit(&mut state.records);
        state.records.generation += 1;
        let snapshot = self.publish_locked(&mut state);
        Some((result, snapshot))
    }

    fn publish_locked(&self, state: &mut CacheState) -> CacheSnapshot {
        state.version += 1;
        let snapshot = state.snapshot();
        self.broadcaster.publish(snapshot.clone());
        snapshot
    }
}
