//! Application constants for Booking Sync
//!
//! This module centralizes all constants used throughout the engine,
//! organized by functional domain.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// Environment variable carrying the owner session token for the CLI
    pub const OWNER_TOKEN: &str = "BOOKING_SYNC_TOKEN";

    /// Environment variable overriding the gateway base URL
    pub const BASE_URL: &str = "BOOKING_SYNC_BASE_URL";
}

/// Engine timing defaults
pub mod engine {
    use super::Duration;

    /// How long a list query result is served from memory
    pub const READ_TTL: Duration = Duration::from_secs(30);

    /// Minimum age of a stale-flagged local record before a refresh may drop it
    pub const STALE_GRACE: Duration = Duration::from_secs(60);
}

/// Remote booking service defaults
pub mod gateway {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "Booking-Sync/0.1.0";

    /// Default base URL of the booking service
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default outgoing request rate limit (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 10;

    /// Path segment of the reservation collection
    pub const RESERVATIONS_PATH: &str = "reservations";

    /// Error body fragments identifying a duplicate-submission conflict
    pub const CONFLICT_MARKERS: &[&str] = &["duplicate key", "unique constraint", "23505"];
}

/// Persisted snapshot format
pub mod store {
    /// Current persisted snapshot format version
    pub const FORMAT_VERSION: u32 = 1;

    /// File/key prefix for per-owner snapshots
    pub const KEY_PREFIX: &str = "reservations-";

    /// Temporary file suffix for atomic writes
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Application directory name under the OS data/config directory
    pub const APP_DIR: &str = "booking-sync";
}

// Re-export commonly used constants at the top level for convenience
pub use engine::READ_TTL;
pub use env::OWNER_TOKEN as ENV_OWNER_TOKEN;
pub use gateway::{DEFAULT_RATE_LIMIT_RPS, USER_AGENT};
