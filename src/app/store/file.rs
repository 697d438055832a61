//! File-backed store with atomic writes
//!
//! Each owner's snapshot lives in `<root>/reservations-<owner key>.json`.
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crash mid-write leaves the previous snapshot intact. Every write gets its
//! own temporary file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, error};

use super::DurableKeyValueStore;
use crate::app::hash::OwnerKey;
use crate::constants::store;
use crate::errors::{StoreError, StoreResult};

/// [`DurableKeyValueStore`] writing one JSON file per owner
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    writes: Arc<AtomicU64>,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        Self::ensure_directory_exists(&root).await?;
        debug!("Opened file store at {}", root.display());
        Ok(Self {
            root,
            writes: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Open a store in the OS data directory
    ///
    /// - macOS: ~/Library/Application Support/booking-sync/store
    /// - Linux: ~/.local/share/booking-sync/store
    /// - Windows: %APPDATA%/booking-sync/store
    pub async fn in_default_location() -> StoreResult<Self> {
        Self::new(Self::default_root()?).await
    }

    pub fn default_root() -> StoreResult<PathBuf> {
        Ok(dirs::data_dir()
            .ok_or_else(|| StoreError::DirectoryNotAccessible {
                path: PathBuf::from("system data directory"),
            })?
            .join(store::APP_DIR)
            .join("store"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the snapshot file for `key`
    pub fn path_for(&self, key: &OwnerKey) -> PathBuf {
        self.root
            .join(format!("{}{}.json", store::KEY_PREFIX, key.to_hex()))
    }

    async fn ensure_directory_exists(path: &Path) -> StoreResult<()> {
        if !path.exists() {
            fs::create_dir_all(path).await.map_err(|e| {
                error!("Failed to create store directory: {}", e);
                StoreError::DirectoryNotAccessible {
                    path: path.to_path_buf(),
                }
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl DurableKeyValueStore for FileStore {
    async fn save(&self, key: &OwnerKey, snapshot: &[u8]) -> StoreResult<()> {
        let final_path = self.path_for(key);
        let write = self.writes.fetch_add(1, Ordering::Relaxed);
        let temp_path =
            final_path.with_extension(format!("json.{}{}", write, store::TEMP_FILE_SUFFIX));

        Self::ensure_directory_exists(&self.root).await?;
        fs::write(&temp_path, snapshot).await?;

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            error!("Failed to move snapshot into place: {}", e);
            let _ = fs::remove_file(&temp_path).await;
            return Err(StoreError::Io(e));
        }

        debug!("Saved snapshot for {} ({} bytes)", key, snapshot.len());
        Ok(())
    }

    async fn load(&self, key: &OwnerKey) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn clear(&self, key: &OwnerKey) -> StoreResult<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => {
                debug!("Cleared snapshot for {}", key);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
