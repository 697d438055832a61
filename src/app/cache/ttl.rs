//! Time-bounded memoization of list queries
//!
//! Results are keyed by `(owner, status, kind)`. A lookup younger than the
//! TTL is served from memory; anything else goes to the gateway. Each key has
//! its own slot lock held across the fetch, so concurrent misses for the same
//! window collapse into one network call while other keys, other owners and
//! invalidations proceed. The map lock is never held across a fetch.
//!
//! Invalidation bumps a per-owner epoch. A fetch that started under an older
//! epoch still answers its caller but is not stored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::app::gateway::RemoteReservationGateway;
use crate::app::hash::OwnerKey;
use crate::app::models::{OwnerIdentity, ReservationKind, ReservationRecord, ReservationStatus};
use crate::app::stats::EngineStats;
use crate::errors::GatewayResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TtlKey {
    owner: OwnerKey,
    status: ReservationStatus,
    kind: Option<ReservationKind>,
}

/// Cached result of one list query
#[derive(Debug, Clone)]
pub struct TtlEntry {
    pub payload: Arc<[ReservationRecord]>,
    pub fetched_at: Instant,
    /// Owner epoch the fetch started under
    pub epoch: u64,
}

type Slot = Arc<Mutex<Option<TtlEntry>>>;

#[derive(Debug, Default)]
struct TtlState {
    slots: HashMap<TtlKey, Slot>,
    epochs: HashMap<OwnerKey, u64>,
}

impl TtlState {
    fn epoch(&self, owner: &OwnerKey) -> u64 {
        self.epochs.get(owner).copied().unwrap_or(0)
    }

    fn bump(&mut self, owner: OwnerKey) {
        *self.epochs.entry(owner).or_insert(0) += 1;
    }

    /// Remove the slots of owners matching `selected` and bump their epochs
    fn drop_slots(&mut self, selected: impl Fn(&OwnerKey) -> bool) -> usize {
        let mut owners: Vec<OwnerKey> = Vec::new();
        let before = self.slots.len();
        self.slots.retain(|key, _| {
            if selected(&key.owner) {
                if !owners.contains(&key.owner) {
                    owners.push(key.owner);
                }
                false
            } else {
                true
            }
        });
        for owner in owners {
            self.bump(owner);
        }
        before - self.slots.len()
    }
}

/// Read-through cache in front of the gateway's list operation
pub struct TtlReadCache {
    ttl: Duration,
    gateway: Arc<dyn RemoteReservationGateway>,
    state: Mutex<TtlState>,
    stats: Arc<EngineStats>,
}

impl std::fmt::Debug for TtlReadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlReadCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TtlReadCache {
    pub fn new(
        ttl: Duration,
        gateway: Arc<dyn RemoteReservationGateway>,
        stats: Arc<EngineStats>,
    ) -> Self {
        Self {
            ttl,
            gateway,
            state: Mutex::new(TtlState::default()),
            stats,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn current_epoch(&self, owner: &OwnerKey) -> u64 {
        self.state.lock().await.epoch(owner)
    }

    /// List bookings for `owner`, from memory when fresh enough
    pub async fn get(
        &self,
        owner: &OwnerIdentity,
        status: ReservationStatus,
        kind: Option<ReservationKind>,
    ) -> GatewayResult<Vec<ReservationRecord>> {
        let key = TtlKey {
            owner: owner.key(),
            status,
            kind,
        };

        let slot = {
            let mut state = self.state.lock().await;
            Arc::clone(state.slots.entry(key).or_default())
        };

        let mut entry = slot.lock().await;
        let epoch = self.current_epoch(&key.owner).await;
        if let Some(cached) = entry.as_ref() {
            if cached.epoch == epoch && cached.fetched_at.elapsed() < self.ttl {
                self.stats.record_ttl_hit();
                return Ok(cached.payload.to_vec());
            }
        }

        self.stats.record_ttl_miss();
        debug!("TTL miss for {} {:?} of {}", status, kind, key.owner);
        let items = self.gateway.list(owner, status, kind).await?;
        let payload: Vec<ReservationRecord> = items
            .into_iter()
            .map(|item| ReservationRecord::from_remote(item, owner))
            .collect();

        if self.current_epoch(&key.owner).await == epoch {
            *entry = Some(TtlEntry {
                payload: payload.clone().into(),
                fetched_at: Instant::now(),
                epoch,
            });
        } else {
            debug!("Cached reads of {} invalidated during fetch", key.owner);
        }
        Ok(payload)
    }

    /// Drop every cached query of `owner`
    pub async fn invalidate(&self, owner: &OwnerKey) -> usize {
        let mut state = self.state.lock().await;
        let dropped = state.drop_slots(|key| key == owner);
        state.bump(*owner);
        if dropped > 0 {
            debug!("Invalidated {} cached queries for {}", dropped, owner);
        }
        dropped
    }

    /// Drop every cached query not belonging to `owner`
    pub async fn retain_owner(&self, owner: &OwnerKey) {
        self.state.lock().await.drop_slots(|key| key != owner);
    }

    pub async fn clear(&self) {
        self.state.lock().await.drop_slots(|_| true);
    }

    /// Number of settled cached queries; slots with a fetch in flight are skipped
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state
            .slots
            .values()
            .filter(|slot| matches!(slot.try_lock(), Ok(entry) if entry.is_some()))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
