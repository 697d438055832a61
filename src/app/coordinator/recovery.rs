//! Local-only resolution of cancels whose outcome was lost
//!
//! When a cancel request fails after it may have reached the server, the
//! only evidence consulted is the local cache. No follow-up network call is
//! made.
//!
//! Known blind spot: an absent record cannot tell "the server applied the
//! cancel but the confirmation was lost" apart from "a concurrent
//! reconciliation removed the record for some other reason". Both are
//! reported as a successful cancel. Telling them apart needs idempotency
//! keys from the booking service.

use tracing::warn;

use crate::app::cache::ReservationCache;
use crate::app::models::OwnerIdentity;
use crate::errors::{GatewayError, SyncError, SyncResult};

/// What the local cache says about a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalEvidence {
    /// The owner is active and the id is not cached
    Absent,
    /// The owner is active and still holds the id
    Present,
    /// The owner was switched away; the cache says nothing about it
    OwnerInactive,
}

impl LocalEvidence {
    pub async fn inspect(cache: &ReservationCache, owner: &OwnerIdentity, id: i64) -> Self {
        if cache.generation(owner).await.is_none() {
            LocalEvidence::OwnerInactive
        } else if cache.contains(owner, id).await {
            LocalEvidence::Present
        } else {
            LocalEvidence::Absent
        }
    }
}

/// Whether a cancel failure may be settled from local state at all
pub fn is_recoverable(failure: &GatewayError) -> bool {
    matches!(
        failure,
        GatewayError::Ambiguous { .. } | GatewayError::Transport { .. }
    )
}

/// Decide the outcome of a cancel that failed with `failure`
///
/// Succeeds only when the record is already gone locally. Otherwise the
/// original failure is surfaced; success is never guessed.
pub fn resolve_cancel(id: i64, failure: GatewayError, evidence: LocalEvidence) -> SyncResult<()> {
    match evidence {
        LocalEvidence::Absent => {
            warn!(
                "Cancel of {} unconfirmed ({}); record already absent locally, treating as cancelled",
                id, failure
            );
            Ok(())
        }
        LocalEvidence::Present | LocalEvidence::OwnerInactive => {
            warn!("Cancel of {} unresolved: {}", id, failure);
            Err(SyncError::Ambiguous {
                id,
                reason: failure.to_string(),
            })
        }
    }
}
