//! Configuration for the sync engine

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::engine;

/// Tunables of [`super::SyncEngine`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a list query result is served from memory
    #[serde(with = "humantime_serde")]
    pub read_ttl: Duration,
    /// How long a stale local record survives refreshes that miss it
    #[serde(with = "humantime_serde")]
    pub stale_grace: Duration,
    /// Spawn a best-effort refresh after every successful create
    pub refresh_after_create: bool,
    /// Spawn a best-effort refresh when an owner is activated
    pub refresh_on_init: bool,
    /// Save and restore per-owner snapshots through the durable store
    pub persist: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            read_ttl: engine::READ_TTL,
            stale_grace: engine::STALE_GRACE,
            refresh_after_create: true,
            refresh_on_init: true,
            persist: true,
        }
    }
}

impl EngineConfig {
    pub fn with_read_ttl(mut self, ttl: Duration) -> Self {
        self.read_ttl = ttl;
        self
    }

    pub fn with_stale_grace(mut self, grace: Duration) -> Self {
        self.stale_grace = grace;
        self
    }

    /// Disable every background refresh; useful for deterministic tests
    pub fn without_background_refresh(mut self) -> Self {
        self.refresh_after_create = false;
        self.refresh_on_init = false;
        self
    }

    pub fn with_persistence(mut self, enabled: bool) -> Self {
        self.persist = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.read_ttl.is_zero() {
            return Err("Read TTL cannot be zero".to_string());
        }
        Ok(())
    }
}
