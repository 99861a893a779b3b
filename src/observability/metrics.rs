//! Metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of the result transport and job lifecycle
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    requests_sent: AtomicU64,
    requests_received: AtomicU64,
    rows_received: AtomicU64,
    results_deferred: AtomicU64,
    context_timeouts: AtomicU64,
    results_discarded: AtomicU64,
    malformed_payloads: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_requests_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_requests_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_received(&self, rows: u64) {
        self.rows_received.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn increment_results_deferred(&self) {
        self.results_deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_context_timeouts(&self) {
        self.context_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_results_discarded(&self) {
        self.results_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_malformed_payloads(&self) {
        self.malformed_payloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_jobs_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_jobs_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"{{"requests_sent":{},"requests_received":{},"rows_received":{},"results_deferred":{},"context_timeouts":{},"results_discarded":{},"malformed_payloads":{},"jobs_completed":{},"jobs_failed":{}}}"#,
            snapshot.requests_sent,
            snapshot.requests_received,
            snapshot.rows_received,
            snapshot.results_deferred,
            snapshot.context_timeouts,
            snapshot.results_discarded,
            snapshot.malformed_payloads,
            snapshot.jobs_completed,
            snapshot.jobs_failed,
        )
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_received: self.requests_received.load(Ordering::Relaxed),
            rows_received: self.rows_received.load(Ordering::Relaxed),
            results_deferred: self.results_deferred.load(Ordering::Relaxed),
            context_timeouts: self.context_timeouts.load(Ordering::Relaxed),
            results_discarded: self.results_discarded.load(Ordering::Relaxed),
            malformed_payloads: self.malformed_payloads.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests_sent: u64,
    pub requests_received: u64,
    pub rows_received: u64,
    pub results_deferred: u64,
    pub context_timeouts: u64,
    pub results_discarded: u64,
    pub malformed_payloads: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
}
