//! Durable key-value store boundary
//!
//! The engine persists one serialized snapshot per owner through
//! [`DurableKeyValueStore`]. Keys are [`OwnerKey`] digests, never raw
//! identities.

pub mod file;
pub mod memory;

use async_trait::async_trait;

use crate::app::hash::OwnerKey;
use crate::errors::StoreResult;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Persistent storage for per-owner serialized snapshots
#[async_trait]
pub trait DurableKeyValueStore: Send + Sync {
    /// Replace the stored snapshot for `key`
    async fn save(&self, key: &OwnerKey, snapshot: &[u8]) -> StoreResult<()>;

    /// Stored snapshot for `key`, if any
    async fn load(&self, key: &OwnerKey) -> StoreResult<Option<Vec<u8>>>;

    /// Drop the stored snapshot for `key`; clearing a missing key succeeds
    async fn clear(&self, key: &OwnerKey) -> StoreResult<()>;
}
