//! Booking Sync Library
//!
//! A client-resident reservation cache that stays eventually consistent with
//! a remote booking service. Writes are applied optimistically, duplicate
//! submissions are verified against the server, and cancels with a lost
//! outcome are settled from local state.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
