//! Submission metrics.
//!
//! Provides atomic counters for monitoring provisioning runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics for the submission orchestrator.
#[derive(Debug)]
pub struct SubmissionMetrics {
    /// Total transactions submitted.
    transactions_submitted: AtomicU64,

    /// Confirmed transactions.
    transactions_confirmed: AtomicU64,

    /// Failed transactions.
    transactions_failed: AtomicU64,

    /// Total instructions carried by submitted transactions.
    instructions_submitted: AtomicU64,

    /// Proxied (augmented) instructions submitted.
    proxied_instructions: AtomicU64,

    /// Event-queue drain rounds.
    drain_rounds: AtomicU64,

    /// Start time for rate calculation.
    start_time: Instant,
}

impl Default for SubmissionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transactions_submitted: AtomicU64::new(0),
            transactions_confirmed: AtomicU64::new(0),
            transactions_failed: AtomicU64::new(0),
            instructions_submitted: AtomicU64::new(0),
            proxied_instructions: AtomicU64::new(0),
            drain_rounds: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a transaction submission carrying `instructions` instructions.
    pub fn record_submission(&self, instructions: usize) {
        self.transactions_submitted.fetch_add(1, Ordering::Relaxed);
        self.instructions_submitted
            .fetch_add(instructions as u64, Ordering::Relaxed);
    }

    /// Records a confirmed transaction.
    pub fn record_confirmed(&self) {
        self.transactions_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed transaction.
    pub fn record_failure(&self) {
        self.transactions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a proxied instruction.
    pub fn record_proxied(&self) {
        self.proxied_instructions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a drain round.
    pub fn record_drain_round(&self) {
        self.drain_rounds.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns total transactions submitted.
    #[must_use]
    pub fn transactions_submitted(&self) -> u64 {
        self.transactions_submitted.load(Ordering::Relaxed)
    }

    /// Returns confirmed transactions.
    #[must_use]
    pub fn transactions_confirmed(&self) -> u64 {
        self.transactions_confirmed.load(Ordering::Relaxed)
    }

    /// Returns failed transactions.
    #[must_use]
    pub fn transactions_failed(&self) -> u64 {
        self.transactions_failed.load(Ordering::Relaxed)
    }

    /// Returns total instructions submitted.
    #[must_use]
    pub fn instructions_submitted(&self) -> u64 {
        self.instructions_submitted.load(Ordering::Relaxed)
    }

    /// Returns proxied instructions submitted.
    #[must_use]
    pub fn proxied_instructions(&self) -> u64 {
        self.proxied_instructions.load(Ordering::Relaxed)
    }

    /// Returns drain rounds.
    #[must_use]
    pub fn drain_rounds(&self) -> u64 {
        self.drain_rounds.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the confirmation rate (0.0 to 1.0).
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let submitted = self.transactions_submitted();
        if submitted > 0 {
            self.transactions_confirmed() as f64 / submitted as f64
        } else {
            0.0
        }
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> SubmissionMetricsSnapshot {
        SubmissionMetricsSnapshot {
            transactions_submitted: self.transactions_submitted(),
            transactions_confirmed: self.transactions_confirmed(),
            transactions_failed: self.transactions_failed(),
            instructions_submitted: self.instructions_submitted(),
            proxied_instructions: self.proxied_instructions(),
            drain_rounds: self.drain_rounds(),
            uptime: self.uptime(),
            success_rate: self.success_rate(),
        }
    }
}

/// A point-in-time snapshot of submission metrics.
#[derive(Debug, Clone)]
pub struct SubmissionMetricsSnapshot {
    /// Total transactions submitted.
    pub transactions_submitted: u64,
    /// Confirmed transactions.
    pub transactions_confirmed: u64,
    /// Failed transactions.
    pub transactions_failed: u64,
    /// Total instructions submitted.
    pub instructions_submitted: u64,
    /// Proxied instructions submitted.
    pub proxied_instructions: u64,
    /// Drain rounds.
    pub drain_rounds: u64,
    /// Uptime.
    pub uptime: Duration,
    /// Confirmation rate.
    pub success_rate: f64,
}
