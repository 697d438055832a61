//! Persistence adapter between the cache and the durable store
//!
//! Records are written in their owner-free wire shape under the owner's
//! digest key, so neither store keys nor stored values carry the session
//! token. On load the records are stamped with the owner being activated.
//!
//! Writes of one owner go through that owner's save slot one at a time. A
//! snapshot older than the last one written is skipped, and once the owner's
//! state is cleared nothing is written for it until it is resumed.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::app::hash::OwnerKey;
use crate::app::models::{CacheSnapshot, OwnerIdentity, RemoteReservation, ReservationRecord};
use crate::app::store::DurableKeyValueStore;
use crate::constants::store;
use crate::errors::{StoreError, StoreResult};

/// On-store representation of one owner's records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub format_version: u32,
    pub owner_key: OwnerKey,
    pub saved_at: DateTime<Utc>,
    pub records: Vec<RemoteReservation>,
}

impl PersistedSnapshot {
    /// Capture the records of `owner` out of `records`
    pub fn capture(owner: &OwnerIdentity, records: &[ReservationRecord]) -> Self {
        Self {
            format_version: store::FORMAT_VERSION,
            owner_key: owner.key(),
            saved_at: Utc::now(),
            records: records
                .iter()
                .filter(|r| r.is_owned_by(owner))
                .map(ReservationRecord::to_remote)
                .collect(),
        }
    }

    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode and check a stored snapshot belongs to `owner`
    pub fn decode(bytes: &[u8], owner: &OwnerIdentity) -> StoreResult<Self> {
        let snapshot: PersistedSnapshot = serde_json::from_slice(bytes)?;
        if snapshot.format_version != store::FORMAT_VERSION {
            return Err(StoreError::Corrupt {
                reason: format!("unsupported format version {}", snapshot.format_version),
            });
        }
        if snapshot.owner_key != owner.key() {
            return Err(StoreError::Corrupt {
                reason: format!(
                    "snapshot for {} stored under key {}",
                    snapshot.owner_key,
                    owner.key()
                ),
            });
        }
        Ok(snapshot)
    }
}

#[derive(Debug, Default)]
struct SaveSlot {
    last_version: Option<u64>,
    closed: bool,
}

/// Saves, restores and clears per-owner snapshots
pub struct PersistenceAdapter {
    store: Arc<dyn DurableKeyValueStore>,
    slots: Mutex<HashMap<OwnerKey, Arc<Mutex<SaveSlot>>>>,
}

impl std::fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter").finish_non_exhaustive()
    }
}

impl PersistenceAdapter {
    pub fn new(store: Arc<dyn DurableKeyValueStore>) -> Self {
        Self {
            store,
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, key: OwnerKey) -> Arc<Mutex<SaveSlot>> {
        Arc::clone(self.slots.lock().await.entry(key).or_default())
    }

    async fn write(&self, owner: &OwnerIdentity, records: &[ReservationRecord]) -> StoreResult<()> {
        let snapshot = PersistedSnapshot::capture(owner, records);
        let bytes = snapshot.encode()?;
        self.store.save(&snapshot.owner_key, &bytes).await?;
        debug!(
            "Persisted {} records for {}",
            snapshot.records.len(),
            snapshot.owner_key
        );
        Ok(())
    }

    /// Persist the records of `owner`; records of anyone else are skipped
    pub async fn save(&self, owner: &OwnerIdentity, records: &[ReservationRecord]) -> StoreResult<()> {
        let slot = self.slot(owner.key()).await;
        let _slot = slot.lock().await;
        self.write(owner, records).await
    }

    /// Persist a published snapshot unless a newer one was already written
    ///
    /// Returns whether the store was written.
    pub async fn save_snapshot(
        &self,
        owner: &OwnerIdentity,
        snapshot: &CacheSnapshot,
    ) -> StoreResult<bool> {
        if snapshot.owner() != Some(owner.key()) {
            return Ok(false);
        }

        let slot = self.slot(owner.key()).await;
        let mut slot = slot.lock().await;
        if slot.closed {
            debug!("Persisted state of {} was cleared, skipping save", owner.key());
            return Ok(false);
        }
        if slot.last_version.is_some_and(|last| last >= snapshot.version()) {
            debug!(
                "Skipping outdated snapshot {} for {}",
                snapshot.version(),
                owner.key()
            );
            return Ok(false);
        }

        self.write(owner, snapshot.records()).await?;
        slot.last_version = Some(snapshot.version());
        Ok(true)
    }

    /// Persist a published snapshot, logging instead of failing
    pub async fn save_best_effort(&self, owner: &OwnerIdentity, snapshot: &CacheSnapshot) {
        if let Err(e) = self.save_snapshot(owner, snapshot).await {
            warn!("Failed to persist snapshot for {}: {}", owner.key(), e);
        }
    }

    /// Accept saves for `owner` again, ignoring snapshots up to `floor`
    pub async fn resume(&self, owner: &OwnerIdentity, floor: u64) {
        let slot = self.slot(owner.key()).await;
        let mut slot = slot.lock().await;
        slot.closed = false;
        slot.last_version = Some(slot.last_version.map_or(floor, |last| last.max(floor)));
    }

    /// Restore the persisted records of `owner`, empty if none were saved
    pub async fn load(&self, owner: &OwnerIdentity) -> StoreResult<Vec<ReservationRecord>> {
        let key = owner.key();
        let Some(bytes) = self.store.load(&key).await? else {
            debug!("No persisted snapshot for {}", key);
            return Ok(Vec::new());
        };

        let snapshot = PersistedSnapshot::decode(&bytes, owner)?;
        info!(
            "Restored {} records for {} saved at {}",
            snapshot.records.len(),
            key,
            snapshot.saved_at
        );
        Ok(snapshot
            .records
            .into_iter()
            .map(|remote| ReservationRecord::from_remote(remote, owner))
            .collect())
    }

    /// Drop persisted state of `owner` and refuse later saves until resumed
    pub async fn clear(&self, owner: &OwnerIdentity) -> StoreResult<()> {
        let slot = self.slot(owner.key()).await;
        let mut slot = slot.lock().await;
        self.store.clear(&owner.key()).await?;
        slot.closed = true;
        info!("Cleared persisted state for {}", owner.key());
        Ok(())
    }

    /// Drop persisted state of `owner`, still accepting later saves
    pub async fn discard(&self, owner: &OwnerIdentity) -> StoreResult<()> {
        let slot = self.slot(owner.key()).await;
        let _slot = slot.lock().await;
        self.store.clear(&owner.key()).await?;
        info!("Discarded persisted state for {}", owner.key());
        Ok(())
    }
}
