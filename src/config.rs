//! Configuration management for Booking Sync
//!
//! This module provides TOML configuration with multi-source loading and
//! zero-config defaults.

use std::path::{Path, PathBuf};

use humantime_serde::re::humantime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{EngineConfig, FileStore, GatewayConfig};
use crate::constants::{env, store};
use crate::errors::{ConfigError, ConfigResult, StoreResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Sync engine tunables
    pub engine: EngineConfig,
    /// Remote booking service client settings
    pub gateway: GatewayConfig,
    /// Durable store settings
    pub store: StoreConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Durable store location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding per-owner snapshots (None = system data directory)
    pub root: Option<PathBuf>,
}

impl StoreConfig {
    /// Open the file store this configuration points at
    pub async fn open(&self) -> StoreResult<FileStore> {
        match &self.root {
            Some(root) => FileStore::new(root.clone()).await,
            None => FileStore::in_default_location().await,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when neither `-v` nor `RUST_LOG` is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (explicit, then project-local, then user)
    /// 3. Environment variables
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        let mut config = match config_path {
            Some(path) => Self::load_from_file(&path).await?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from("./booking-sync.toml")];
        if let Some(path) = Self::default_config_path() {
            search_paths.push(path);
        }

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Some(path);
            }
        }

        debug!("No config file found in standard locations");
        None
    }

    /// The per-user config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(store::APP_DIR).join("config.toml"))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var(env::BASE_URL) {
            if !base_url.trim().is_empty() {
                debug!("Base URL overridden from {}", env::BASE_URL);
                self.gateway.base_url = base_url;
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Err(reason) = self.engine.validate() {
            return Err(ConfigError::InvalidValue {
                field: "engine.read_ttl".to_string(),
                value: humantime::format_duration(self.engine.read_ttl).to_string(),
                reason,
            });
        }

        if self.gateway.rate_limit_rps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "gateway.rate_limit_rps".to_string(),
                value: "0".to_string(),
                reason: "Rate limit must be at least one request per second".to_string(),
            });
        }

        if let Err(e) = self.gateway.parsed_base_url() {
            return Err(ConfigError::InvalidValue {
                field: "gateway.base_url".to_string(),
                value: self.gateway.base_url.clone(),
                reason: e.to_string(),
            });
        }

        Ok(())
    }

    /// Default configuration rendered as commented TOML
    pub fn generate_default_config_content() -> String {
        let defaults = Self::default();
        format!(
            r#"# Booking Sync Configuration
# You can customize any of these settings to suit your needs.

[engine]
# List queries younger than this are served from memory
read_ttl = "{}"
# How long a local booking missing from the server list is kept
stale_grace = "{}"
refresh_after_create = true
refresh_on_init = true
persist = true

[gateway]
base_url = "{}"
request_timeout = "{}"
connect_timeout = "{}"
rate_limit_rps = {}

[store]
# root = "/path/to/snapshots"  # Defaults to the system data directory

[logging]
level = "warn"  # error, warn, info, debug, trace
"#,
            humantime::format_duration(defaults.engine.read_ttl),
            humantime::format_duration(defaults.engine.stale_grace),
            defaults.gateway.base_url,
            humantime::format_duration(defaults.gateway.request_timeout),
            humantime::format_duration(defaults.gateway.connect_timeout),
            defaults.gateway.rate_limit_rps,
        )
    }
}
