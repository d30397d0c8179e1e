//! Sink handler implementations
//!
//! Contains NotifierSink, RecorderSink, UploaderSink and LogSink. Each runs
//! behind a [`QueuedSink`](crate::QueuedSink).

mod log;
mod notifier;
mod recorder;
mod uploader;

pub use self::log::LogSink;
pub use self::notifier::{Listener, NotifierSink};
pub use self::recorder::{RecorderConfig, RecorderSink, DEFAULT_FILENAME_PATTERN};
pub use self::uploader::{
    BatchPoster, HttpPoster, LocalBatchPoster, UploaderConfig, UploaderSink,
};
