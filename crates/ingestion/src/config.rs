//! Source settings and metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::SourceConfig;

/// Worker loop settings
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Upper bound of one transport read; also bounds `stop` latency
    pub read_timeout: Duration,

    /// Frames above this length are discarded as corrupted
    pub max_frame_len: usize,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(100),
            max_frame_len: 64 * 1024,
        }
    }
}

impl From<&SourceConfig> for SourceSettings {
    fn from(config: &SourceConfig) -> Self {
        Self {
            read_timeout: Duration::from_millis(config.read_timeout_ms.max(1)),
            max_frame_len: config.max_frame_len,
        }
    }
}

/// Per-source counters
#[derive(Debug, Default)]
pub struct SourceMetrics {
    /// Total bytes read from the transport
    pub bytes_received: AtomicU64,

    /// Records handed to the handler
    pub records_delivered: AtomicU64,

    /// Frames that failed to decode or exceeded the limit
    pub corrupted_frames: AtomicU64,

    /// Fatal transport read failures
    pub read_errors: AtomicU64,
}

impl SourceMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_bytes(&self, source_id: &str, bytes: usize) {
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
        observability::metrics::record_source_bytes(source_id, bytes);
    }

    pub fn record_delivered(&self, source_id: &str) {
        self.records_delivered.fetch_add(1, Ordering::Relaxed);
        observability::metrics::record_record_delivered(source_id);
    }

    pub fn record_corrupted(&self, source_id: &str) {
        self.corrupted_frames.fetch_add(1, Ordering::Relaxed);
        observability::metrics::record_corrupted_frame(source_id);
    }

    pub fn record_read_error(&self, source_id: &str) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
        observability::metrics::record_source_read_error(source_id);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> SourceMetricsSnapshot {
        SourceMetricsSnapshot {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            corrupted_frames: self.corrupted_frames.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMetricsSnapshot {
    pub bytes_received: u64,
    pub records_delivered: u64,
    pub corrupted_frames: u64,
    pub read_errors: u64,
}
