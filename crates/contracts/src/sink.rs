//! Sink traits - Vehicle output interface
//!
//! Two sides of a sink:
//! - [`DataSink`]: producer side, called by the Vehicle on the source thread.
//!   `receive` must never block on the consumer.
//! - [`SinkHandler`]: consumer side, driven by a queue worker task.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::{ContractError, Measurement};

/// Future returned by [`DataSink::stop`]
pub type SinkStop<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Producer-side sink registered with a Vehicle
pub trait DataSink: Send + Sync {
    /// Sink name (used for logging/metrics and `remove_sink`)
    fn name(&self) -> &str;

    /// Accept one measurement without waiting for the consumer
    ///
    /// # Errors
    /// Reported by the Vehicle; never affects other sinks.
    fn receive(&self, measurement: &Measurement) -> Result<(), ContractError>;

    /// Drain and release resources
    fn stop(&self) -> SinkStop<'_> {
        Box::pin(std::future::ready(()))
    }
}

/// Consumer-side processing driven by a queue worker
#[trait_variant::make(SinkHandler: Send)]
pub trait LocalSinkHandler {
    /// Handler name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Process one measurement
    ///
    /// # Errors
    /// Counted and logged by the worker, which keeps going.
    async fn handle(&mut self, measurement: &Measurement) -> Result<(), ContractError>;

    /// Flush buffered output (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Release resources; called once after the final flush
    async fn close(&mut self) -> Result<(), ContractError>;

    /// Periodic flush tick, if the handler wants one
    fn flush_interval(&self) -> Option<Duration> {
        None
    }
}
