//! Local reservation state
//!
//! - [`records`] - the owner-scoped record collection and its locked edit step
//! - [`ttl`] - time-bounded memoization of list queries
//! - [`persistence`] - snapshot save/load/clear against the durable store
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use booking_sync::app::broadcast::ChangeBroadcaster;
//! use booking_sync::app::cache::ReservationCache;
//! use booking_sync::app::models::OwnerIdentity;
//!
//! # async fn example() {
//! let broadcaster = Arc::new(ChangeBroadcaster::new());
//! let cache = ReservationCache::new(broadcaster.clone());
//!
//! let owner = OwnerIdentity::new("session-token");
//! let snapshot = cache.activate(&owner).await;
//! assert!(snapshot.is_empty());
//! assert_eq!(broadcaster.latest().version(), snapshot.version());
//! # }
//! ```

pub mod persistence;
pub mod records;
pub mod ttl;

pub use persistence::{PersistedSnapshot, PersistenceAdapter};
pub use records::{Activation, CachedEntry, OwnerRecords, ReservationCache};
pub use ttl::{TtlEntry, TtlReadCache};
