//! Engine counters
//!
//! Lock-free counters bumped by the coordinator, the reconciler and the read
//! cache. [`EngineStats::snapshot`] produces a plain copy for display.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Shared atomic counters
#[derive(Debug, Default)]
pub struct EngineStats {
    creates: AtomicU64,
    conflicts_resolved: AtomicU64,
    conflicts_rejected: AtomicU64,
    cancels: AtomicU64,
    ambiguous_resolved: AtomicU64,
    ambiguous_unresolved: AtomicU64,
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
    ttl_hits: AtomicU64,
    ttl_misses: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Creates acknowledged by the service with an id
    pub creates: u64,
    /// Conflicts confirmed as already-booked and returned as success
    pub conflicts_resolved: u64,
    /// Conflicts surfaced as `AlreadyReserved`
    pub conflicts_rejected: u64,
    /// Cancels explicitly confirmed by the service
    pub cancels: u64,
    /// Ambiguous cancels resolved as success from local state
    pub ambiguous_resolved: u64,
    /// Ambiguous cancels surfaced to the caller
    pub ambiguous_unresolved: u64,
    pub refreshes: u64,
    pub refresh_failures: u64,
    pub ttl_hits: u64,
    pub ttl_misses: u64,
}

impl StatsSnapshot {
    /// Share of list queries served from memory, in percent
    pub fn ttl_hit_rate(&self) -> f64 {
        let total = self.ttl_hits + self.ttl_misses;
        if total == 0 {
            0.0
        } else {
            (self.ttl_hits as f64 / total as f64) * 100.0
        }
    }
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_create(&self) {
        Self::bump(&self.creates);
    }

    pub fn record_conflict_resolved(&self) {
        Self::bump(&self.conflicts_resolved);
    }

    pub fn record_conflict_rejected(&self) {
        Self::bump(&self.conflicts_rejected);
    }

    pub fn record_cancel(&self) {
        Self::bump(&self.cancels);
    }

    pub fn record_ambiguous_resolved(&self) {
        Self::bump(&self.ambiguous_resolved);
    }

    pub fn record_ambiguous_unresolved(&self) {
        Self::bump(&self.ambiguous_unresolved);
    }

    pub fn record_refresh(&self) {
        Self::bump(&self.refreshes);
    }

    pub fn record_refresh_failure(&self) {
        Self::bump(&self.refresh_failures);
    }

    pub fn record_ttl_hit(&self) {
        Self::bump(&self.ttl_hits);
    }

    pub fn record_ttl_miss(&self) {
        Self::bump(&self.ttl_misses);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            creates: self.creates.load(Ordering::Relaxed),
            conflicts_resolved: self.conflicts_resolved.load(Ordering::Relaxed),
            conflicts_rejected: self.conflicts_rejected.load(Ordering::Relaxed),
            cancels: self.cancels.load(Ordering::Relaxed),
            ambiguous_resolved: self.ambiguous_resolved.load(Ordering::Relaxed),
            ambiguous_unresolved: self.ambiguous_unresolved.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            ttl_hits: self.ttl_hits.load(Ordering::Relaxed),
            ttl_misses: self.ttl_misses.load(Ordering::Relaxed),
        }
    }
}
