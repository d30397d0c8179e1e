//! # Ingestion
//!
//! Raw vehicle data sources.
//!
//! Responsibilities:
//! - Run one worker thread per [`DataSource`]
//! - Read bytes from a [`Transport`](contracts::Transport) with a bounded timeout
//! - Split the byte stream into frames (`\n` or `\0`) and decode them with a
//!   [`Formatter`](contracts::Formatter)
//! - Hand each record, stamped with its arrival order, to the handler
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{transports::channel, DataSource};
//!
//! let (transport, sender) = channel("injected");
//! let source = DataSource::new("injected", Box::new(transport));
//! source.start(Arc::new(|record| println!("{record:?}")))?;
//! sender.send_line(r#"{"name": "vehicle_speed", "value": 42}"#)?;
//! source.stop();
//! ```

mod config;
mod error;
mod factory;
mod framing;
mod source;
pub mod transports;

// Re-exports
pub use config::{SourceMetrics, SourceMetricsSnapshot, SourceSettings};
pub use error::{IngestionError, Result};
pub use factory::create_source;
pub use framing::{Frame, LineFramer};
pub use source::{DataSource, RecordHandler, SourceState};
