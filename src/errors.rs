//! Error types for Booking Sync
//!
//! This module defines the error taxonomy for every component of the engine.
//! Gateway errors describe what the remote booking service told us (or failed
//! to tell us); sync errors are the typed failures handed back to UI callers.

use std::path::PathBuf;
use thiserror::Error;

/// Outcome classification for remote booking service calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The service reported a duplicate / already-exists condition
    #[error("Reservation conflict reported by booking service: {diagnostic}")]
    Conflict { diagnostic: String },

    /// Network or I/O failure with no evidence the request was processed
    #[error("Transport failure: {reason}")]
    Transport { reason: String },

    /// The request was sent but its outcome confirmation was lost
    #[error("Outcome unknown, confirmation lost: {reason}")]
    Ambiguous { reason: String },

    /// The service answered with a status the engine does not classify
    #[error("Booking service rejected the request: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Gateway could not be constructed from its configuration
    #[error("Invalid gateway configuration: {reason}")]
    Config { reason: String },
}

/// Durable key-value store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error while reading or writing persisted state
    #[error("Store I/O error")]
    Io(#[from] std::io::Error),

    /// Persisted snapshot could not be (de)serialized
    #[error("Snapshot serialization error")]
    Serialization(#[from] serde_json::Error),

    /// Persisted snapshot is readable but not usable
    #[error("Persisted snapshot is corrupt: {reason}")]
    Corrupt { reason: String },

    /// Store directory not found or inaccessible
    #[error("Store directory not accessible: {path}")]
    DirectoryNotAccessible { path: PathBuf },
}

/// Typed failures returned by the engine to UI callers
#[derive(Error, Debug)]
pub enum SyncError {
    /// Create hit a conflict and no matching booking could be found
    #[error("Already reserved: {diagnostic}")]
    AlreadyReserved { diagnostic: String },

    /// Network failure with no evidence the server processed the request
    #[error("Transport failure: {reason}")]
    Transport { reason: String },

    /// Outcome of a cancel could not be determined from local state
    #[error("Cancel outcome unknown for reservation {id}: {reason}")]
    Ambiguous { id: i64, reason: String },

    /// Any failure not classified above, surfaced unchanged
    #[error("Unknown failure: {0}")]
    Unknown(GatewayError),

    /// An operation was invoked without an active owner session
    #[error("No active owner session. Call init() first")]
    NoActiveOwner,

    /// The owner's serial mutation queue has shut down
    #[error("Mutation queue for the owner session is closed")]
    QueueClosed,

    /// Persistence failure surfaced by an explicit lifecycle call
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Map a gateway failure for an operation without a recovery sub-flow
    ///
    /// A lost confirmation outside of cancel is reported as a transport
    /// failure; only cancel runs the ambiguity heuristic.
    pub fn from_gateway(error: GatewayError) -> Self {
        match error {
            GatewayError::Transport { reason } | GatewayError::Ambiguous { reason } => {
                SyncError::Transport { reason }
            }
            other => SyncError::Unknown(other),
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration file could not be read or written
    #[error("Configuration file I/O error: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine operation error
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Gateway construction or call error
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Sync(SyncError::Transport { .. })
            | AppError::Sync(SyncError::Ambiguous { .. })
            | AppError::Gateway(GatewayError::Transport { .. })
            | AppError::Gateway(GatewayError::Ambiguous { .. }) => true,

            AppError::Sync(SyncError::AlreadyReserved { .. })
            | AppError::Sync(SyncError::NoActiveOwner)
            | AppError::Config(_) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Sync(_) => "sync",
            AppError::Gateway(_) => "gateway",
            AppError::Store(_) => "store",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Gateway result type alias
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Store result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Engine operation result type alias
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
