//! Remote booking service boundary
//!
//! The engine only talks to the booking service through
//! [`RemoteReservationGateway`]. Implementations classify every failure into
//! a [`GatewayError`] so the mutation coordinator can pick a recovery path:
//!
//! - `create` may fail with `Conflict`, `Transport` or `Rejected`
//! - `cancel` may fail with `Transport`, `Ambiguous` or `Rejected`
//! - `list` may fail with `Transport` or `Rejected`
//!
//! Timeouts are owned by the implementation; the engine adds none of its own.
//!
//! [`GatewayError`]: crate::errors::GatewayError

pub mod config;
pub mod http;

use async_trait::async_trait;

use crate::app::models::{
    CreateReservation, OwnerIdentity, RemoteReservation, ReservationKind, ReservationStatus,
};
use crate::errors::GatewayResult;

pub use config::GatewayConfig;
pub use http::HttpGateway;

/// Network operations against the authoritative booking service
#[async_trait]
pub trait RemoteReservationGateway: Send + Sync {
    /// Submit a booking; returns the server-assigned id
    async fn create(
        &self,
        owner: &OwnerIdentity,
        request: &CreateReservation,
    ) -> GatewayResult<i64>;

    /// Cancel the booking with `id`
    async fn cancel(&self, owner: &OwnerIdentity, id: i64) -> GatewayResult<()>;

    /// List bookings in a status partition, optionally filtered by kind
    async fn list(
        &self,
        owner: &OwnerIdentity,
        status: ReservationStatus,
        kind: Option<ReservationKind>,
    ) -> GatewayResult<Vec<RemoteReservation>>;
}
