//! Pipeline metric recorders
//!
//! Thin named wrappers over the `metrics` facade so every crate reports under the
//! same `vehicle_pipeline_*` names and labels. Without an installed recorder
//! (tests, library use) every call is a no-op.

use metrics::{counter, gauge, histogram};

// ===== Sources =====

/// Bytes read from a transport
pub fn record_source_bytes(source_id: &str, bytes: usize) {
    counter!(
        "vehicle_pipeline_source_bytes_total",
        "source" => source_id.to_string()
    )
    .increment(bytes as u64);
}

/// Record decoded and handed to the vehicle
pub fn record_record_delivered(source_id: &str) {
    counter!(
        "vehicle_pipeline_source_records_total",
        "source" => source_id.to_string()
    )
    .increment(1);
}

/// Frame that could not be decoded, or exceeded the frame limit
pub fn record_corrupted_frame(source_id: &str) {
    counter!(
        "vehicle_pipeline_source_corrupted_frames_total",
        "source" => source_id.to_string()
    )
    .increment(1);
}

/// Fatal transport read failure
pub fn record_source_read_error(source_id: &str) {
    counter!(
        "vehicle_pipeline_source_read_errors_total",
        "source" => source_id.to_string()
    )
    .increment(1);
}

// ===== Vehicle =====

/// Raw record entering translation
pub fn record_record_received() {
    counter!("vehicle_pipeline_records_received_total").increment(1);
}

/// Record dropped during translation
pub fn record_translation_error(kind: &'static str) {
    counter!("vehicle_pipeline_translation_errors_total", "kind" => kind).increment(1);
}

/// Numeric value outside its valid range
pub fn record_out_of_range(measurement: &str, dropped: bool) {
    let policy = if dropped { "drop" } else { "flag" };
    counter!(
        "vehicle_pipeline_out_of_range_total",
        "measurement" => measurement.to_string(),
        "policy" => policy
    )
    .increment(1);
}

/// Measurement dispatched to the sink list
pub fn record_measurement_dispatched(measurement: &str) {
    counter!(
        "vehicle_pipeline_measurements_dispatched_total",
        "measurement" => measurement.to_string()
    )
    .increment(1);
}

// ===== Sinks =====

/// Sink error or panic, by processing stage
pub fn record_sink_failure(sink_name: &str, stage: &'static str) {
    counter!(
        "vehicle_pipeline_sink_failures_total",
        "sink" => sink_name.to_string(),
        "stage" => stage
    )
    .increment(1);
}

/// Measurement accepted into a sink queue
pub fn record_sink_enqueued(sink_name: &str) {
    counter!(
        "vehicle_pipeline_sink_enqueued_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// Measurement rejected by a full sink queue
pub fn record_sink_dropped(sink_name: &str) {
    counter!(
        "vehicle_pipeline_sink_dropped_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// Measurement handled by a sink worker
pub fn record_sink_processed(sink_name: &str) {
    counter!(
        "vehicle_pipeline_sink_processed_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// Current sink queue depth
pub fn record_sink_queue_len(sink_name: &str, len: usize) {
    gauge!(
        "vehicle_pipeline_sink_queue_len",
        "sink" => sink_name.to_string()
    )
    .set(len as f64);
}

/// One upload attempt: outcome is `ok`, `failed` or `dropped`
pub fn record_upload(sink_name: &str, outcome: &'static str, records: usize) {
    counter!(
        "vehicle_pipeline_upload_batches_total",
        "sink" => sink_name.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    counter!(
        "vehicle_pipeline_upload_records_total",
        "sink" => sink_name.to_string(),
        "outcome" => outcome
    )
    .increment(records as u64);
}

/// Upload request round trip
pub fn record_upload_latency_ms(sink_name: &str, latency_ms: f64) {
    histogram!(
        "vehicle_pipeline_upload_latency_ms",
        "sink" => sink_name.to_string()
    )
    .record(latency_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorders_are_noops_without_exporter() {
        record_source_bytes("trace", 128);
        record_translation_error("unrecognized");
        record_out_of_range("vehicle_speed", false);
        record_sink_queue_len("recorder", 3);
        record_upload("uploader", "ok", 25);
        record_upload_latency_ms("uploader", 12.5);
    }
}
