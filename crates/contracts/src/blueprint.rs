//! PipelineBlueprint - Config Loader output
//!
//! Describes a complete pipeline: vehicle settings, custom measurement kinds,
//! sources and sink routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::{ContractError, MeasurementKind, Range, Unit};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline configuration blueprint
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PipelineBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Vehicle settings
    #[serde(default)]
    pub vehicle: VehicleSettings,

    /// Measurement kinds added to (or replacing) the built-in ones
    #[serde(default)]
    #[validate(nested)]
    pub measurements: Vec<MeasurementSpec>,

    /// Raw data sources
    #[serde(default)]
    #[validate(nested)]
    pub sources: Vec<SourceConfig>,

    /// Output routing
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

/// Vehicle-wide settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleSettings {
    #[serde(default)]
    pub range_policy: RangePolicy,
}

/// What to do with numeric values outside their valid range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePolicy {
    /// Keep and dispatch, report as out of range
    #[default]
    Flag,
    /// Report and drop before the latest-value table is touched
    Drop,
}

/// Custom measurement kind
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MeasurementSpec {
    #[validate(length(min = 1))]
    pub name: String,

    pub class: MeasurementClass,

    #[serde(default)]
    pub unit: Unit,

    /// Numeric kinds: lower bound
    #[serde(default)]
    pub minimum: Option<f64>,

    /// Numeric kinds: upper bound
    #[serde(default)]
    pub maximum: Option<f64>,

    /// Stateful and evented kinds: allowed states
    #[serde(default)]
    pub states: Vec<String>,
}

/// Capability class names used in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementClass {
    Numeric,
    Boolean,
    Stateful,
    Evented,
}

impl MeasurementSpec {
    /// Build the registry entry
    ///
    /// # Errors
    /// Missing or inverted bounds, or an empty state list.
    pub fn to_kind(&self) -> Result<MeasurementKind, ContractError> {
        let field = |name: &str| format!("measurements[{}].{name}", self.name);
        match self.class {
            MeasurementClass::Numeric => {
                let (Some(minimum), Some(maximum)) = (self.minimum, self.maximum) else {
                    return Err(ContractError::config_validation(
                        field("minimum"),
                        "numeric kinds need minimum and maximum",
                    ));
                };
                let range = Range::new(minimum, maximum)
                    .map_err(|e| ContractError::config_validation(field("maximum"), e.to_string()))?;
                Ok(MeasurementKind::numeric(&self.name, self.unit, range))
            }
            MeasurementClass::Boolean => Ok(MeasurementKind::boolean(&self.name)),
            MeasurementClass::Stateful | MeasurementClass::Evented => {
                if self.states.is_empty() {
                    return Err(ContractError::config_validation(
                        field("states"),
                        "state list must not be empty",
                    ));
                }
                let states = self.states.iter().cloned();
                Ok(if self.class == MeasurementClass::Evented {
                    MeasurementKind::evented(&self.name, states)
                } else {
                    MeasurementKind::stateful(&self.name, states)
                })
            }
        }
    }
}

/// Data source configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SourceConfig {
    /// Unique identifier
    #[validate(length(min = 1))]
    pub id: String,

    /// Transport type
    pub source_type: SourceType,

    /// Upper bound of one blocking transport read
    #[serde(default = "default_read_timeout_ms")]
    #[validate(range(min = 1))]
    pub read_timeout_ms: u64,

    /// Frames longer than this are discarded as corrupted
    #[serde(default = "default_max_frame_len")]
    #[validate(range(min = 16))]
    pub max_frame_len: usize,

    /// Type specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_read_timeout_ms() -> u64 {
    100
}

fn default_max_frame_len() -> usize {
    64 * 1024
}

/// Source type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Recorded JSON-lines trace file
    Trace,
    /// TCP socket
    Network,
    /// Built-in vehicle simulator
    Simulated,
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink name
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Queue capacity; unbounded when absent
    #[serde(default)]
    #[validate(range(min = 1))]
    pub queue_capacity: Option<usize>,

    /// How long `stop` waits for the queue to drain
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    /// Type specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_drain_timeout_ms() -> u64 {
    5_000
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// JSON-lines session file
    Recorder,
    /// Batched HTTP POST
    Uploader,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_defaults() {
        let sink: SinkConfig =
            serde_json::from_str(r#"{"name": "trace", "sink_type": "recorder"}"#).unwrap();
        assert_eq!(sink.queue_capacity, None);
        assert_eq!(sink.drain_timeout_ms, 5_000);
        assert!(sink.params.is_empty());
    }

    #[test]
    fn test_numeric_spec_to_kind() {
        let spec = MeasurementSpec {
            name: "battery_voltage".into(),
            class: MeasurementClass::Numeric,
            unit: Unit::Undefined,
            minimum: Some(0.0),
            maximum: Some(16.0),
            states: vec![],
        };
        let kind = spec.to_kind().unwrap();
        assert_eq!(kind.valid_range(), Some(Range::new(0.0, 16.0).unwrap()));

        let inverted = MeasurementSpec {
            minimum: Some(20.0),
            ..spec
        };
        assert!(inverted.to_kind().is_err());
    }

    #[test]
    fn test_stateful_spec_needs_states() {
        let spec = MeasurementSpec {
            name: "wiper_mode".into(),
            class: MeasurementClass::Stateful,
            unit: Unit::Undefined,
            minimum: None,
            maximum: None,
            states: vec![],
        };
        assert!(matches!(
            spec.to_kind(),
            Err(ContractError::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_field_rules() {
        let mut blueprint = PipelineBlueprint::default();
        blueprint.sinks.push(SinkConfig {
            name: String::new(),
            sink_type: SinkType::Log,
            queue_capacity: Some(0),
            drain_timeout_ms: 100,
            params: HashMap::new(),
        });
        let errors = blueprint.validate().unwrap_err();
        assert!(errors.errors().contains_key("sinks"));
    }
}
