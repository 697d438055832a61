//! Prelude module for Booking Sync Library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use booking_sync::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use booking_sync::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let gateway = Arc::new(HttpGateway::new(&GatewayConfig::default())?);
//!     let store = Arc::new(MemoryStore::new());
//!     let engine = SyncEngine::new(EngineConfig::default(), gateway, store);
//!
//!     engine.init(&OwnerIdentity::new("session-token")).await?;
//!     let upcoming = engine.query(ReservationStatus::Upcoming, None).await?;
//!     println!("{} upcoming reservations", upcoming.len());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result, SyncError, SyncResult};

// Engine and its collaborators
pub use crate::app::{
    CacheSnapshot,
    CreateReservation,
    DurableKeyValueStore,
    EngineConfig,
    FileStore,
    GatewayConfig,
    HttpGateway,
    MemoryStore,
    OwnerIdentity,
    RemoteReservationGateway,
    ReservationKind,
    ReservationRecord,
    ReservationStatus,
    SnapshotSubscription,
    StatsSnapshot,
    SyncEngine,
};

// Configuration
pub use crate::config::AppConfig;

// Commonly used constants
pub use crate::constants::{DEFAULT_RATE_LIMIT_RPS, ENV_OWNER_TOKEN, READ_TTL, USER_AGENT};

// Standard library re-exports that are commonly needed
pub use std::sync::Arc;

pub use tokio;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        let _engine_config = EngineConfig::default();
        let _gateway_config = GatewayConfig::default();
        let _app_config = AppConfig::default();

        assert_eq!(READ_TTL.as_secs(), 30);
        assert!(USER_AGENT.contains("Booking-Sync"));
    }

    #[tokio::test]
    async fn test_prelude_integration_pattern() {
        let gateway = Arc::new(HttpGateway::new(&GatewayConfig::default()).unwrap());
        let engine = SyncEngine::new(
            EngineConfig::default().without_background_refresh(),
            gateway,
            Arc::new(MemoryStore::new()),
        );

        assert!(matches!(
            engine.refresh().await,
            Err(SyncError::NoActiveOwner)
        ));
        assert!(engine.snapshot().await.is_empty());
    }
}
