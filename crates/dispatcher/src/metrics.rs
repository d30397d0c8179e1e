//! Sink metrics for observability
//!
//! Atomic counters for tests and snapshots; every update is mirrored to the
//! `metrics` facade under the sink's name.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use observability::metrics as obs;

/// Metrics for a single sink
#[derive(Debug)]
pub struct SinkMetrics {
    name: String,
    /// Current queue length
    queue_len: AtomicUsize,
    /// Measurements accepted into the queue
    enqueued: AtomicU64,
    /// Measurements handled successfully
    processed: AtomicU64,
    /// Handler, flush, close or drain failures
    failures: AtomicU64,
    /// Measurements rejected by a full queue
    dropped: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue_len: AtomicUsize::new(0),
            enqueued: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Get current queue length
    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    /// Set current queue length
    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
        obs::record_sink_queue_len(&self.name, len);
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn inc_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        obs::record_sink_enqueued(&self.name);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn inc_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        obs::record_sink_processed(&self.name);
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Increment failure count; `stage` is `handle`, `flush`, `close` or `drain`
    pub fn inc_failures(&self, stage: &'static str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        obs::record_sink_failure(&self.name, stage);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        obs::record_sink_dropped(&self.name);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> SinkMetricsSnapshot {
        SinkMetricsSnapshot {
            queue_len: self.queue_len(),
            enqueued: self.enqueued(),
            processed: self.processed(),
            failures: self.failures(),
            dropped: self.dropped(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkMetricsSnapshot {
    pub queue_len: usize,
    pub enqueued: u64,
    pub processed: u64,
    pub failures: u64,
    pub dropped: u64,
}
