//! # Vehicle
//!
//! Telemetry orchestrator.
//!
//! Responsibilities:
//! - Own the data sources and start them with the Vehicle as record handler
//! - Translate raw records into validated measurements via the registry
//! - Keep the latest value per measurement name (pull API: [`Vehicle::get`])
//! - Fan measurements out to sinks in registration order, isolating failures
//! - Route listener callbacks through the built-in notifier sink
//!
//! ## Usage Example
//!
//! ```ignore
//! use vehicle::{Vehicle, MeasurementRegistry};
//!
//! let vehicle = Vehicle::new(MeasurementRegistry::standard());
//! vehicle.listen("steering_wheel_angle", Arc::new(|m| println!("{m}")))?;
//! vehicle.add_source(source)?;
//!
//! // later
//! let angle = vehicle.get("steering_wheel_angle");
//! vehicle.shutdown().await;
//! ```

mod builder;
mod error;
mod metrics;
mod vehicle;

pub use builder::VehicleBuilder;
pub use error::{Result, VehicleError};
pub use metrics::{VehicleMetrics, VehicleMetricsSnapshot};
pub use vehicle::{Vehicle, VehicleConfig, NOTIFIER_SINK};

// Re-export contracts types
pub use contracts::{Measurement, MeasurementRegistry, RangePolicy, RawRecord};
pub use dispatcher::Listener;
