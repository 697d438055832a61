//! In-memory store for tests and embedders without a filesystem

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::DurableKeyValueStore;
use crate::app::hash::OwnerKey;
use crate::errors::StoreResult;

/// Volatile [`DurableKeyValueStore`] backed by a map
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<OwnerKey, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of owners with stored state
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl DurableKeyValueStore for MemoryStore {
    async fn save(&self, key: &OwnerKey, snapshot: &[u8]) -> StoreResult<()> {
        self.entries.write().await.insert(*key, snapshot.to_vec());
        Ok(())
    }

    async fn load(&self, key: &OwnerKey) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn clear(&self, key: &OwnerKey) -> StoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
