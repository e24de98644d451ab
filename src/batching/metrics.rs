//! Metrics for the command batcher.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated on every submission and flush pass
#[derive(Debug, Default)]
pub struct BatcherMetrics {
    /// Commands appended to the pending queue
    pub commands_submitted: AtomicU64,

    /// Attempts to acquire the flushing flag
    pub flush_attempts: AtomicU64,

    /// Attempts that found another thread already flushing
    pub contended_attempts: AtomicU64,

    /// Forced flushes recorded for the in-flight flusher to honor
    pub force_requests_recorded: AtomicU64,

    /// Calls that returned partial results after losing re-acquisition
    pub handoffs: AtomicU64,

    /// Batches handed to the sink successfully
    pub batches_dispatched: AtomicU64,

    /// Commands handed to the sink successfully
    pub commands_dispatched: AtomicU64,

    /// Batches delivered through the single-command dispatch form
    pub single_dispatches: AtomicU64,

    /// Sink calls that returned an error
    pub dispatch_failures: AtomicU64,

    /// Largest batch handed to the sink
    pub largest_batch: AtomicU64,
}

impl BatcherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.commands_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush_attempt(&self) {
        self.flush_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_contended(&self) {
        self.contended_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_force_request(&self) {
        self.force_requests_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handoff(&self) {
        self.handoffs.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch accepted by the sink
    pub fn record_batch(&self, batch_len: usize) {
        let batch_len = batch_len as u64;
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        self.commands_dispatched.fetch_add(batch_len, Ordering::Relaxed);
        if batch_len == 1 {
            self.single_dispatches.fetch_add(1, Ordering::Relaxed);
        }
        self.largest_batch.fetch_max(batch_len, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let batches_dispatched = self.batches_dispatched.load(Ordering::Relaxed);
        let commands_dispatched = self.commands_dispatched.load(Ordering::Relaxed);

        let average_batch_size = if batches_dispatched == 0 {
            0.0
        } else {
            commands_dispatched as f64 / batches_dispatched as f64
        };

        MetricsSnapshot {
            commands_submitted: self.commands_submitted.load(Ordering::Relaxed),
            flush_attempts: self.flush_attempts.load(Ordering::Relaxed),
            contended_attempts: self.contended_attempts.load(Ordering::Relaxed),
            force_requests_recorded: self.force_requests_recorded.load(Ordering::Relaxed),
            handoffs: self.handoffs.load(Ordering::Relaxed),
            batches_dispatched,
            commands_dispatched,
            single_dispatches: self.single_dispatches.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            largest_batch: self.largest_batch.load(Ordering::Relaxed),
            average_batch_size,
        }
    }
}

/// Serializable view of [`BatcherMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub commands_submitted: u64,
    pub flush_attempts: u64,
    pub contended_attempts: u64,
    pub force_requests_recorded: u64,
    pub handoffs: u64,
    pub batches_dispatched: u64,
    pub commands_dispatched: u64,
    pub single_dispatches: u64,
    pub dispatch_failures: u64,
    pub largest_batch: u64,
    pub average_batch_size: f64,
}
