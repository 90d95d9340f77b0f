//! Shared health state for the /health endpoint.
//! Updated by the reconciler, read by the API.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Reconciliation telemetry. Unmatched pending records are a normal
/// operating state, so `pending` here is informational, not an alarm.
#[derive(Default)]
pub struct HealthState {
    /// Unix seconds of the last completed reconcile sweep (0 = none yet).
    pub last_reconcile_at: AtomicI64,
    /// Predictions settled by the last sweep.
    pub last_resolved_count: AtomicU64,
    /// Pending predictions observed by the last sweep.
    pub pending_count: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_reconcile(&self, at_secs: i64, resolved: u64, pending: u64) {
        self.last_reconcile_at.store(at_secs, Ordering::Relaxed);
        self.last_resolved_count.store(resolved, Ordering::Relaxed);
        self.pending_count.store(pending, Ordering::Relaxed);
    }

    pub fn last_reconcile_at(&self) -> i64 {
        self.last_reconcile_at.load(Ordering::Relaxed)
    }

    pub fn last_resolved_count(&self) -> u64 {
        self.last_resolved_count.load(Ordering::Relaxed)
    }

    pub fn pending_count(&self) -> u64 {
        self.pending_count.load(Ordering::Relaxed)
    }
}
