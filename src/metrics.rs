use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing workflow activity for one store.
#[derive(Default)]
pub struct WorkflowMetrics {
    loads_applied: AtomicU64,
    stale_results_discarded: AtomicU64,
    vectorizations_submitted: AtomicU64,
    vectorizations_succeeded: AtomicU64,
    vectorizations_failed: AtomicU64,
    vectorizations_rejected: AtomicU64,
}

impl WorkflowMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a listing result that was written into the workflow state.
    pub fn record_load_applied(&self) {
        self.loads_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a listing result dropped because a newer request superseded it.
    pub fn record_stale_discarded(&self) {
        self.stale_results_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a vectorization request that passed validation and reached the backend.
    pub fn record_submitted(&self) {
        self.vectorizations_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the terminal outcome of a submitted vectorization.
    pub fn record_outcome(&self, succeeded: bool) {
        let counter = if succeeded {
            &self.vectorizations_succeeded
        } else {
            &self.vectorizations_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a vectorization rejected before any network call.
    pub fn record_rejected(&self) {
        self.vectorizations_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            loads_applied: self.loads_applied.load(Ordering::Relaxed),
            stale_results_discarded: self.stale_results_discarded.load(Ordering::Relaxed),
            vectorizations_submitted: self.vectorizations_submitted.load(Ordering::Relaxed),
            vectorizations_succeeded: self.vectorizations_succeeded.load(Ordering::Relaxed),
            vectorizations_failed: self.vectorizations_failed.load(Ordering::Relaxed),
            vectorizations_rejected: self.vectorizations_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of workflow counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Listing results applied to the state.
    pub loads_applied: u64,
    /// Listing results discarded by the last-call-wins rule.
    pub stale_results_discarded: u64,
    /// Vectorization requests sent to the backend.
    pub vectorizations_submitted: u64,
    /// Vectorization requests that completed successfully.
    pub vectorizations_succeeded: u64,
    /// Vectorization requests the backend rejected or that failed in transit.
    pub vectorizations_failed: u64,
    /// Vectorization attempts refused locally (invalid or already in progress).
    pub vectorizations_rejected: u64,
}
