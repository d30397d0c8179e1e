//! Vehicle error types

use thiserror::Error;

use contracts::{ContractError, MeasurementError};
use dispatcher::DispatcherError;
use ingestion::IngestionError;

/// Vehicle-level errors
#[derive(Debug, Error)]
pub enum VehicleError {
    /// Translation failure (unknown name, bad state, wrong type)
    #[error(transparent)]
    Measurement(#[from] MeasurementError),

    /// Numeric value outside its range, dropped by policy
    #[error("measurement '{name}' value {value} outside its valid range")]
    OutOfRange { name: String, value: f64 },

    /// No source with this id
    #[error("unknown source '{0}'")]
    UnknownSource(String),

    #[error("ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    #[error("dispatcher error: {0}")]
    Dispatcher(#[from] DispatcherError),

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl VehicleError {
    /// Label used for the translation error metric
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Measurement(e) => e.kind_label(),
            Self::OutOfRange { .. } => "out_of_range",
            Self::UnknownSource(_) => "unknown_source",
            Self::Ingestion(_) => "ingestion",
            Self::Dispatcher(_) => "dispatcher",
            Self::Contract(_) => "contract",
        }
    }
}

/// Result type alias for Vehicle operations
pub type Result<T> = std::result::Result<T, VehicleError>;
