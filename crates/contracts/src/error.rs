//! Layered error definitions
//!
//! Categorized by source: config / measurement / source / format / sink / delivery

use thiserror::Error;

/// Measurement translation and update errors
///
/// Every variant is a translation error: the record is dropped, the pipeline continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeasurementError {
    /// No kind is registered under this name
    #[error("unrecognized measurement '{name}'")]
    Unrecognized { name: String },

    /// State is not part of the kind's enumeration
    #[error("invalid state '{state}' for measurement '{name}'")]
    InvalidState { name: String, state: String },

    /// Raw value type does not match the kind
    #[error("measurement '{name}' expects a {expected} value, got {found}")]
    ValueType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// NaN or infinite number, not representable on the wire
    #[error("measurement '{name}' got a non-finite number")]
    NonFinite { name: String },

    /// Range bounds are inverted or not numbers
    #[error("invalid range [{minimum}, {maximum}]")]
    InvalidRange { minimum: f64, maximum: f64 },
}

impl MeasurementError {
    /// Create an unrecognized measurement error
    pub fn unrecognized(name: impl Into<String>) -> Self {
        Self::Unrecognized { name: name.into() }
    }

    /// Create an invalid state error
    pub fn invalid_state(name: impl Into<String>, state: impl Into<String>) -> Self {
        Self::InvalidState {
            name: name.into(),
            state: state.into(),
        }
    }

    /// Short label used for metrics
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Unrecognized { .. } => "unrecognized",
            Self::InvalidState { .. } => "invalid_state",
            Self::ValueType { .. } => "value_type",
            Self::NonFinite { .. } => "non_finite",
            Self::InvalidRange { .. } => "invalid_range",
        }
    }
}

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Measurement Errors =====
    /// Translation or update failure
    #[error(transparent)]
    Measurement(#[from] MeasurementError),

    // ===== Source Errors =====
    /// Transport failure, fatal for the affected source
    #[error("data source '{source_id}' error: {message}")]
    DataSource { source_id: String, message: String },

    /// Frame could not be decoded by the formatter
    #[error("format error: {message}")]
    Format { message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    /// Remote delivery failed (network error, timeout or error status)
    #[error("delivery to '{endpoint}' failed: {message}")]
    Delivery { endpoint: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create data source error
    pub fn data_source(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create delivery error
    pub fn delivery(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}
