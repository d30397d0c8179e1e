//! LogSink - logs every measurement via tracing

use contracts::{ContractError, Measurement, SinkHandler};
use tracing::{info, instrument};

/// Sink that logs measurements for debugging
pub struct LogSink {
    name: String,
    count: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: 0,
        }
    }

    /// Measurements logged so far
    pub fn count(&self) -> u64 {
        self.count
    }

    fn log_measurement(&mut self, measurement: &Measurement) {
        self.count += 1;
        info!(
            sink = %self.name,
            measurement = measurement.name(),
            value = %measurement.value(),
            unit = measurement.unit().symbol(),
            event = ?measurement.event(),
            within_range = ?measurement.within_range(),
            "Measurement received"
        );
    }
}

impl SinkHandler for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_handle",
        skip(self, measurement),
        fields(sink = %self.name, measurement = measurement.name())
    )]
    async fn handle(&mut self, measurement: &Measurement) -> Result<(), ContractError> {
        self.log_measurement(measurement);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, measurements = self.count, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::{MeasurementRegistry, RawValue};

    #[tokio::test]
    async fn test_log_sink_handle() {
        let mut sink = LogSink::new("test_log");
        let m = MeasurementRegistry::standard()
            .create("door_status", &RawValue::from("driver"), Some(RawValue::Boolean(true)), Utc::now())
            .unwrap();

        assert!(sink.handle(&m).await.is_ok());
        assert!(sink.handle(&m).await.is_ok());
        assert_eq!(sink.count(), 2);
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
