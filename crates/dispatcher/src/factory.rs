//! Sink factory - builds queued sinks from configuration

use tracing::{info, instrument};

use contracts::{SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::queued::{QueueConfig, QueuedSink};
use crate::sinks::{LogSink, RecorderSink, UploaderSink};

/// Create a running QueuedSink from configuration
///
/// Must be called inside a Tokio runtime.
#[instrument(
    name = "dispatcher_create_sink",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub fn create_sink(config: &SinkConfig) -> Result<QueuedSink, DispatcherError> {
    let queue = QueueConfig::from(config);
    let sink = match config.sink_type {
        SinkType::Log => QueuedSink::spawn(LogSink::new(&config.name), queue),
        SinkType::Recorder => {
            let handler = RecorderSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            QueuedSink::spawn(handler, queue)
        }
        SinkType::Uploader => {
            let handler = UploaderSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            QueuedSink::spawn(handler, queue)
        }
    };
    info!(sink = %config.name, "Sink created");
    Ok(sink)
}
