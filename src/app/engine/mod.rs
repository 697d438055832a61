//! Owner-scoped sync service
//!
//! [`SyncEngine`] wires the cache, the read cache, reconciliation, the
//! mutation coordinator and persistence together behind an explicit
//! `init` / `teardown` lifecycle. Nothing in the crate is global: an
//! embedder builds one engine and hands it to whatever needs it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use booking_sync::app::engine::{EngineConfig, SyncEngine};
//! use booking_sync::app::gateway::{GatewayConfig, HttpGateway};
//! use booking_sync::app::models::{CreateReservation, OwnerIdentity};
//! use booking_sync::app::store::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Arc::new(HttpGateway::new(&GatewayConfig::default())?);
//! let engine = SyncEngine::new(EngineConfig::default(), gateway, Arc::new(MemoryStore::new()));
//!
//! let mut updates = engine.subscribe();
//! engine.init(&OwnerIdentity::new("session-token")).await?;
//!
//! let id = engine.create(CreateReservation::group("55")).await?;
//! assert!(updates.current().contains(id));
//! # Ok(())
//! # }
//! ```

pub mod config;

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{error, info};

use crate::app::broadcast::{ChangeBroadcaster, SnapshotSubscription};
use crate::app::cache::{PersistenceAdapter, ReservationCache, TtlReadCache};
use crate::app::coordinator::MutationCoordinator;
use crate::app::gateway::RemoteReservationGateway;
use crate::app::models::{
    CacheSnapshot, CreateReservation, OwnerIdentity, ReservationKind, ReservationRecord,
    ReservationStatus,
};
use crate::app::reconcile::ReconciliationEngine;
use crate::app::stats::{EngineStats, StatsSnapshot};
use crate::app::store::DurableKeyValueStore;
use crate::errors::{StoreError, SyncError, SyncResult};

pub use config::EngineConfig;

/// The reservation sync service for one process
pub struct SyncEngine {
    config: EngineConfig,
    broadcaster: Arc<ChangeBroadcaster>,
    cache: Arc<ReservationCache>,
    reads: Arc<TtlReadCache>,
    reconciler: Arc<ReconciliationEngine>,
    coordinator: Arc<MutationCoordinator>,
    persistence: Arc<PersistenceAdapter>,
    stats: Arc<EngineStats>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(
        config: EngineConfig,
        gateway: Arc<dyn RemoteReservationGateway>,
        store: Arc<dyn DurableKeyValueStore>,
    ) -> Self {
        let stats = Arc::new(EngineStats::new());
        let broadcaster = Arc::new(ChangeBroadcaster::new());
        let cache = Arc::new(ReservationCache::new(Arc::clone(&broadcaster)));
        let reads = Arc::new(TtlReadCache::new(
            config.read_ttl,
            Arc::clone(&gateway),
            Arc::clone(&stats),
        ));
        let persistence = Arc::new(PersistenceAdapter::new(store));
        let saving = config.persist.then(|| Arc::clone(&persistence));

        let reconciler = Arc::new(ReconciliationEngine::new(
            Arc::clone(&gateway),
            Arc::clone(&cache),
            saving.clone(),
            Arc::clone(&stats),
            config.stale_grace,
        ));
        let coordinator = Arc::new(
            MutationCoordinator::new(
                gateway,
                Arc::clone(&cache),
                Arc::clone(&reads),
                Arc::clone(&reconciler),
                saving,
                Arc::clone(&stats),
            )
            .with_refresh_after_create(config.refresh_after_create),
        );

        Self {
            config,
            broadcaster,
            cache,
            reads,
            reconciler,
            coordinator,
            persistence,
            stats,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Activate `owner`
    ///
    /// Records of any previously active owner are dropped before anything
    /// of `owner` becomes visible. Persisted records are restored next, then
    /// a background refresh is spawned if configured. Activating the owner
    /// that is already active only re-emits the current snapshot.
    ///
    /// # Errors
    ///
    /// `SyncError::Store` if the persisted state could not be read. The
    /// owner stays active with an empty cache in that case. An unreadable
    /// snapshot is discarded rather than reported.
    pub async fn init(&self, owner: &OwnerIdentity) -> SyncResult<CacheSnapshot> {
        let activation = self.cache.switch_to(owner).await;
        if !activation.changed {
            return Ok(activation.snapshot);
        }
        if let Some(previous) = &activation.previous {
            self.coordinator.release(&previous.key()).await;
        }

        let mut snapshot = activation.snapshot;
        self.reads.retain_owner(&owner.key()).await;
        self.persistence.resume(owner, snapshot.version()).await;
        info!("Activated owner {}", owner.key());

        if self.config.persist {
            if let Some(restored) = self.restore(owner).await? {
                snapshot = restored;
            }
        }

        if self.config.refresh_on_init {
            self.reconciler.spawn_refresh(owner.clone());
        }
        Ok(snapshot)
    }

    async fn restore(&self, owner: &OwnerIdentity) -> SyncResult<Option<CacheSnapshot>> {
        let records = match self.persistence.load(owner).await {
            Ok(records) => records,
            Err(e @ (StoreError::Corrupt { .. } | StoreError::Serialization(_))) => {
                error!("Discarding unreadable snapshot of {}: {}", owner.key(), e);
                self.persistence.discard(owner).await?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if records.is_empty() {
            return Ok(None);
        }

        let restored = self
            .cache
            .apply(owner, |cached| {
                let now = Instant::now();
                let mut inserted = 0;
                for record in records {
                    if cached.insert_if_absent(record, now) {
                        inserted += 1;
                    }
                }
                inserted
            })
            .await;
        Ok(restored.map(|(count, snapshot)| {
            info!("Restored {} persisted records for {}", count, owner.key());
            snapshot
        }))
    }

    /// Deactivate the current owner and drop all in-memory state
    ///
    /// Persisted state is kept. Mutations already submitted still reach the
    /// gateway but no longer touch the cache.
    pub async fn teardown(&self) {
        let Some(owner) = self.cache.active_owner().await else {
            return;
        };
        self.coordinator.release(&owner.key()).await;
        self.reads.invalidate(&owner.key()).await;
        self.cache.deactivate().await;
        info!("Tore down owner {}", owner.key());
    }

    /// Tear down the current owner and forget its persisted state
    pub async fn sign_out(&self) -> SyncResult<()> {
        let owner = self.require_owner().await?;
        self.teardown().await;
        self.persistence.clear(&owner).await?;
        info!("Signed out {}", owner.key());
        Ok(())
    }

    pub async fn active_owner(&self) -> Option<OwnerIdentity> {
        self.cache.active_owner().await
    }

    /// Book `request` for the active owner
    pub async fn create(&self, request: CreateReservation) -> SyncResult<i64> {
        let owner = self.require_owner().await?;
        self.coordinator.create(&owner, request).await
    }

    /// Cancel reservation `id` of the active owner
    pub async fn cancel(&self, id: i64) -> SyncResult<()> {
        let owner = self.require_owner().await?;
        self.coordinator.cancel(&owner, id).await
    }

    /// List reservations through the read cache
    pub async fn query(
        &self,
        status: ReservationStatus,
        kind: Option<ReservationKind>,
    ) -> SyncResult<Vec<ReservationRecord>> {
        let owner = self.require_owner().await?;
        self.reads
            .get(&owner, status, kind)
            .await
            .map_err(SyncError::from_gateway)
    }

    /// Reconcile the cache with the server and wait for the result
    pub async fn refresh(&self) -> SyncResult<CacheSnapshot> {
        let owner = self.require_owner().await?;
        self.reconciler.refresh(&owner).await
    }

    /// Subscribe to snapshots of the active owner
    pub fn subscribe(&self) -> SnapshotSubscription {
        self.broadcaster.subscribe()
    }

    /// Copy of the current cache content
    pub async fn snapshot(&self) -> CacheSnapshot {
        self.cache.snapshot().await
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    async fn require_owner(&self) -> SyncResult<OwnerIdentity> {
        self.cache
            .active_owner()
            .await
            .ok_or(SyncError::NoActiveOwner)
    }
}
