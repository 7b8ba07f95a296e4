//! Process-wide delivery metrics.
//!
//! Exposed for observability and tests, not wired to an exporter: the
//! scheduling core records simple atomic counters rather than pulling in a
//! metrics pipeline, which is out of scope here.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct DeliveryMetrics {
    total_attempts: AtomicU64,
    success_count: AtomicU64,
    /// Consecutive failures since the last success (spec §4.A:
    /// `failureCount (consecutive)`), not a lifetime total — reset to zero
    /// on `record_success`, mirroring the circuit breaker's own
    /// consecutive-failure counter.
    consecutive_failure_count: AtomicU64,
    timeout_count: AtomicU64,
    last_error: Mutex<Option<String>>,
    last_success: Mutex<Option<chrono::DateTime<chrono::Utc>>>,
}

/// Snapshot of [`DeliveryMetrics`] at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub total_attempts: u64,
    pub success_count: u64,
    pub consecutive_failure_count: u64,
    pub timeout_count: u64,
    pub last_error: Option<String>,
    pub last_success: Option<chrono::DateTime<chrono::Utc>>,
}

impl DeliveryMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self) {
        self.total_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, at: chrono::DateTime<chrono::Utc>) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failure_count.store(0, Ordering::Relaxed);
        *self.last_success.lock() = Some(at);
    }

    pub fn record_failure(&self, error: impl Into<String>) {
        self.consecutive_failure_count.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock() = Some(error.into());
    }

    pub fn record_timeout(&self) {
        self.timeout_count.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_attempts: self.total_attempts.load(Ordering::Relaxed),
            success_count: self.success_count.load(Ordering::Relaxed),
            consecutive_failure_count: self.consecutive_failure_count.load(Ordering::Relaxed),
            timeout_count: self.timeout_count.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
            last_success: *self.last_success.lock(),
        }
    }
}
