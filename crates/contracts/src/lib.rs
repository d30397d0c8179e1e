//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the pipeline.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Data Model
//! - [`Range`] / [`AgingData`]: pure value types
//! - [`Measurement`]: a named, unit-tagged, timestamped data point whose kind is
//!   resolved through an explicit [`MeasurementRegistry`]
//! - [`RawRecord`]: untyped payload produced by a [`Formatter`] from transport bytes
//!
//! ## Time Model
//! - Wall clock (`DateTime<Utc>`) for `last_update`; serialized as epoch seconds (f64)

mod aging;
mod blueprint;
mod error;
mod format;
mod measurement;
mod range;
mod record;
mod registry;
mod sink;
mod transport;
mod unit;

pub use aging::AgingData;
pub use blueprint::*;
pub use error::*;
pub use format::{Formatter, JsonFormatter};
pub use measurement::{KindClass, Measurement, MeasurementKind, MeasurementValue};
pub use range::Range;
pub use record::{CanMessage, RawMeasurement, RawRecord, RawValue, SourceRecord};
pub use registry::MeasurementRegistry;
pub use sink::{DataSink, LocalSinkHandler, SinkHandler, SinkStop};
pub use transport::{Transport, TransportRead};
pub use unit::Unit;
