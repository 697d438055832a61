//! Create and cancel orchestration
//!
//! The coordinator is the only writer besides reconciliation. Every mutation
//! of an owner is submitted to that owner's [`SerialQueue`], so a second
//! create or cancel starts only after the first one has applied its cache
//! effect. Mutations of different owners run on different queues.
//!
//! # Architecture
//!
//! - [`serial`] - the per-owner FIFO worker
//! - [`recovery`] - local-only settlement of cancels with a lost outcome
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use booking_sync::app::coordinator::MutationCoordinator;
//! use booking_sync::app::models::{CreateReservation, OwnerIdentity};
//!
//! # async fn example(coordinator: Arc<MutationCoordinator>) -> Result<(), Box<dyn std::error::Error>> {
//! let owner = OwnerIdentity::new("session-token");
//! let id = coordinator
//!     .create(&owner, CreateReservation::group("55"))
//!     .await?;
//! coordinator.cancel(&owner, id).await?;
//! # Ok(())
//! # }
//! ```

pub mod recovery;
pub mod serial;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::app::cache::{OwnerRecords, PersistenceAdapter, ReservationCache, TtlReadCache};
use crate::app::gateway::RemoteReservationGateway;
use crate::app::hash::OwnerKey;
use crate::app::models::{CreateReservation, OwnerIdentity, ReservationRecord, ReservationStatus};
use crate::app::reconcile::ReconciliationEngine;
use crate::app::stats::EngineStats;
use crate::errors::{GatewayError, SyncError, SyncResult};

pub use recovery::LocalEvidence;
pub use serial::SerialQueue;

/// Entry point for create and cancel
pub struct MutationCoordinator {
    gateway: Arc<dyn RemoteReservationGateway>,
    cache: Arc<ReservationCache>,
    reads: Arc<TtlReadCache>,
    reconciler: Arc<ReconciliationEngine>,
    persistence: Option<Arc<PersistenceAdapter>>,
    stats: Arc<EngineStats>,
    refresh_after_create: bool,
    queues: Mutex<HashMap<OwnerKey, Arc<SerialQueue>>>,
}

impl std::fmt::Debug for MutationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationCoordinator")
            .field("refresh_after_create", &self.refresh_after_create)
            .finish_non_exhaustive()
    }
}

impl MutationCoordinator {
    pub fn new(
        gateway: Arc<dyn RemoteReservationGateway>,
        cache: Arc<ReservationCache>,
        reads: Arc<TtlReadCache>,
        reconciler: Arc<ReconciliationEngine>,
        persistence: Option<Arc<PersistenceAdapter>>,
        stats: Arc<EngineStats>,
    ) -> Self {
        Self {
            gateway,
            cache,
            reads,
            reconciler,
            persistence,
            stats,
            refresh_after_create: true,
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Enable or disable the background refresh spawned after a create
    pub fn with_refresh_after_create(mut self, enabled: bool) -> Self {
        self.refresh_after_create = enabled;
        self
    }

    /// Book `request` for `owner`
    ///
    /// # Errors
    ///
    /// - `AlreadyReserved` when the server reports a duplicate and no
    ///   matching booking can be found
    /// - `Transport` when the request failed without server evidence
    /// - `Unknown` for any other gateway failure
    /// - `QueueClosed` if the owner's queue was torn down
    pub async fn create(
        self: &Arc<Self>,
        owner: &OwnerIdentity,
        request: CreateReservation,
    ) -> SyncResult<i64> {
        let queue = self.queue_for(owner).await;
        let this = Arc::clone(self);
        let owner = owner.clone();
        queue
            .submit(async move { this.run_create(&owner, request).await })
            .await?
    }

    /// Cancel reservation `id` of `owner`
    ///
    /// # Errors
    ///
    /// - `Ambiguous` when the outcome was lost and the record is still cached
    /// - `Unknown` when the server explicitly refused
    /// - `QueueClosed` if the owner's queue was torn down
    pub async fn cancel(self: &Arc<Self>, owner: &OwnerIdentity, id: i64) -> SyncResult<()> {
        let queue = self.queue_for(owner).await;
        let this = Arc::clone(self);
        let owner = owner.clone();
        queue
            .submit(async move { this.run_cancel(&owner, id).await })
            .await?
    }

    /// Drop the queue of `owner`; jobs already submitted still finish
    pub async fn release(&self, owner: &OwnerKey) -> bool {
        let removed = self.queues.lock().await.remove(owner).is_some();
        if removed {
            debug!("Released mutation queue for {}", owner);
        }
        removed
    }

    /// Number of owners with a live queue
    pub async fn queue_count(&self) -> usize {
        self.queues.lock().await.len()
    }

    async fn queue_for(&self, owner: &OwnerIdentity) -> Arc<SerialQueue> {
        let key = owner.key();
        let mut queues = self.queues.lock().await;
        if let Some(queue) = queues.get(&key) {
            if !queue.is_closed() {
                return Arc::clone(queue);
            }
            warn!("Mutation queue for {} closed, starting a new one", key);
        }
        let queue = Arc::new(SerialQueue::spawn(key.to_hex()));
        queues.insert(key, Arc::clone(&queue));
        queue
    }

    async fn run_create(&self, owner: &OwnerIdentity, request: CreateReservation) -> SyncResult<i64> {
        match self.gateway.create(owner, &request).await {
            Ok(id) => {
                let record = ReservationRecord::from_request(id, &request, owner);
                self.commit(owner, |records| records.upsert(record, Instant::now()))
                    .await;
                self.stats.record_create();
                info!("Created {} reservation {} for {}", request.kind, id, owner.key());

                if self.refresh_after_create {
                    self.reconciler.spawn_refresh(owner.clone());
                }
                Ok(id)
            }
            Err(GatewayError::Conflict { diagnostic }) => {
                self.verify_conflict(owner, &request, diagnostic).await
            }
            Err(e) => {
                warn!("Create for {} failed: {}", owner.key(), e);
                Err(SyncError::from_gateway(e))
            }
        }
    }

    /// Look for the booking the server claims already exists
    async fn verify_conflict(
        &self,
        owner: &OwnerIdentity,
        request: &CreateReservation,
        diagnostic: String,
    ) -> SyncResult<i64> {
        info!(
            "Create for {} conflicted, verifying against the server list",
            owner.key()
        );
        self.reads.invalidate(&owner.key()).await;

        let listed = match self
            .reads
            .get(owner, ReservationStatus::Upcoming, None)
            .await
        {
            Ok(listed) => listed,
            Err(e) => {
                warn!("Conflict verification list failed: {}", e);
                self.stats.record_conflict_rejected();
                return Err(SyncError::AlreadyReserved { diagnostic });
            }
        };

        let Some(existing) = listed.into_iter().find(|r| request.matches(r)) else {
            self.stats.record_conflict_rejected();
            return Err(SyncError::AlreadyReserved { diagnostic });
        };

        let id = existing.id;
        self.commit(owner, |records| records.upsert(existing, Instant::now()))
            .await;
        self.reconciler.refresh_best_effort(owner).await;
        self.stats.record_conflict_resolved();
        info!("Conflict resolved: reservation {} already exists", id);
        Ok(id)
    }

    async fn run_cancel(&self, owner: &OwnerIdentity, id: i64) -> SyncResult<()> {
        match self.gateway.cancel(owner, id).await {
            Ok(()) => {
                self.commit(owner, |records| records.remove(id, Instant::now()))
                    .await;
                self.stats.record_cancel();
                info!("Cancelled reservation {} for {}", id, owner.key());
                Ok(())
            }
            Err(failure) if recovery::is_recoverable(&failure) => {
                let evidence = LocalEvidence::inspect(&self.cache, owner, id).await;
                let outcome = recovery::resolve_cancel(id, failure, evidence);
                if outcome.is_ok() {
                    self.reads.invalidate(&owner.key()).await;
                    self.stats.record_ambiguous_resolved();
                } else {
                    self.stats.record_ambiguous_unresolved();
                }
                outcome
            }
            Err(failure) => {
                warn!("Cancel of {} refused: {}", id, failure);
                Err(SyncError::Unknown(failure))
            }
        }
    }

    /// Apply `edit`, invalidate cached reads and persist the new state
    ///
    /// The gateway already accepted the change, so an owner switch that
    /// happened in between only skips the cache edit.
    async fn commit<R>(
        &self,
        owner: &OwnerIdentity,
        edit: impl FnOnce(&mut OwnerRecords) -> R,
    ) -> Option<R> {
        let outcome = self.cache.apply(owner, edit).await;
        let (result, snapshot) = match outcome {
            Some(applied) => applied,
            None => {
                warn!(
                    "Owner {} no longer active, mutation not applied to cache",
                    owner.key()
                );
                return None;
            }
        };
        self.reads.invalidate(&owner.key()).await;
        if let Some(persistence) = &self.persistence {
            persistence.save_best_effort(owner, &snapshot).await;
        }
        Some(result)
    }
}
