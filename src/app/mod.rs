//! Core sync engine components
//!
//! This module contains the reservation cache, the read cache in front of the
//! booking service, reconciliation, the mutation coordinator and the
//! persistence boundary, plus the [`SyncEngine`] that wires them together.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use booking_sync::app::{
//!     EngineConfig, FileStore, GatewayConfig, HttpGateway, OwnerIdentity, ReservationStatus,
//!     SyncEngine,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Arc::new(HttpGateway::new(&GatewayConfig::default())?);
//! let store = Arc::new(FileStore::in_default_location().await?);
//! let engine = SyncEngine::new(EngineConfig::default(), gateway, store);
//!
//! engine.init(&OwnerIdentity::new("session-token")).await?;
//! for record in engine.query(ReservationStatus::Upcoming, None).await? {
//!     println!("{} {}", record.id, record.kind);
//! }
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod cache;
pub mod coordinator;
pub mod engine;
pub mod gateway;
pub mod hash;
pub mod models;
pub mod reconcile;
pub mod stats;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main public API
pub use broadcast::{ChangeBroadcaster, SnapshotSubscription};
pub use cache::{PersistedSnapshot, PersistenceAdapter, ReservationCache, TtlReadCache};
pub use coordinator::{MutationCoordinator, SerialQueue};
pub use engine::{EngineConfig, SyncEngine};
pub use gateway::{GatewayConfig, HttpGateway, RemoteReservationGateway};
pub use hash::OwnerKey;
pub use models::{
    CacheSnapshot, CreateReservation, OwnerIdentity, RemoteReservation, ReservationKind,
    ReservationRecord, ReservationStatus,
};
pub use reconcile::{MergeReport, ReconciliationEngine};
pub use stats::{EngineStats, StatsSnapshot};
pub use store::{DurableKeyValueStore, FileStore, MemoryStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Ensure public API is accessible
        let config = EngineConfig::default();
        assert!(config.persist);
        assert!(GatewayConfig::default().parsed_base_url().is_ok());
    }
}
