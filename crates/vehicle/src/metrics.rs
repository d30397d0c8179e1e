//! Vehicle counters, mirrored to the `metrics` facade

use std::sync::atomic::{AtomicU64, Ordering};

use observability::metrics as obs;

#[derive(Debug, Default)]
pub struct VehicleMetrics {
    records_received: AtomicU64,
    measurements_dispatched: AtomicU64,
    translation_errors: AtomicU64,
    out_of_range: AtomicU64,
    sink_failures: AtomicU64,
}

impl VehicleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
        obs::record_record_received();
    }

    pub fn record_dispatched(&self, measurement: &str) {
        self.measurements_dispatched.fetch_add(1, Ordering::Relaxed);
        obs::record_measurement_dispatched(measurement);
    }

    pub fn record_translation_error(&self, kind: &'static str) {
        self.translation_errors.fetch_add(1, Ordering::Relaxed);
        obs::record_translation_error(kind);
    }

    pub fn record_out_of_range(&self, measurement: &str, dropped: bool) {
        self.out_of_range.fetch_add(1, Ordering::Relaxed);
        obs::record_out_of_range(measurement, dropped);
    }

    pub fn record_sink_failure(&self, sink: &str) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
        obs::record_sink_failure(sink, "receive");
    }

    pub fn snapshot(&self) -> VehicleMetricsSnapshot {
        VehicleMetricsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            measurements_dispatched: self.measurements_dispatched.load(Ordering::Relaxed),
            translation_errors: self.translation_errors.load(Ordering::Relaxed),
            out_of_range: self.out_of_range.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`VehicleMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VehicleMetricsSnapshot {
    pub records_received: u64,
    pub measurements_dispatched: u64,
    pub translation_errors: u64,
    pub out_of_range: u64,
    pub sink_failures: u64,
}
