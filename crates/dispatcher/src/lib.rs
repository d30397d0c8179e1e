//! # Dispatcher
//!
//! Sink side of the pipeline.
//!
//! Provides:
//! - `QueuedSink`: one queue and worker task per sink, so a slow or failing
//!   sink never blocks the source thread or other sinks
//! - the concrete sink handlers (notifier, recorder, uploader, log)
//! - per-sink metrics and a factory driven by `SinkConfig`

pub mod error;
pub mod factory;
pub mod metrics;
pub mod queued;
pub mod sinks;

pub use contracts::{DataSink, SinkHandler};
pub use error::DispatcherError;
pub use factory::create_sink;
pub use metrics::{SinkMetrics, SinkMetricsSnapshot};
pub use queued::{QueueConfig, QueuedSink};
pub use sinks::{
    BatchPoster, HttpPoster, Listener, LogSink, NotifierSink, RecorderConfig, RecorderSink,
    UploaderConfig, UploaderSink,
};
