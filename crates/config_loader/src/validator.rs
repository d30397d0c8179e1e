//! Configuration validation
//!
//! Field-level rules come from the `Validate` derives on the blueprint types.
//! Cross-field rules checked here:
//! - source id unique
//! - sink name unique
//! - custom measurement kinds well formed (bounds ordered, states non-empty)
//! - required params present per source / sink type

use std::collections::{HashMap, HashSet};

use ::validator::Validate;
use contracts::{
    ContractError, PipelineBlueprint, SinkConfig, SinkType, SourceConfig, SourceType,
};

/// Validate a PipelineBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_measurements(blueprint)?;
    validate_source_ids(blueprint)?;
    validate_sink_names(blueprint)?;
    for source in &blueprint.sources {
        validate_source_params(source)?;
    }
    for sink in &blueprint.sinks {
        validate_sink_params(sink)?;
    }
    Ok(())
}

/// Derive-generated field rules
fn validate_fields(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let field = errors
            .errors()
            .keys()
            .next()
            .map(|key| key.to_string())
            .unwrap_or_default();
        ContractError::config_validation(field, errors.to_string())
    })
}

fn validate_measurements(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for spec in &blueprint.measurements {
        if !seen.insert(&spec.name) {
            return Err(ContractError::config_validation(
                format!("measurements[name={}]", spec.name),
                "duplicate measurement name",
            ));
        }
        spec.to_kind()?;
    }
    Ok(())
}

fn validate_source_ids(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for source in &blueprint.sources {
        if !seen.insert(&source.id) {
            return Err(ContractError::config_validation(
                format!("sources[id={}]", source.id),
                "duplicate source id",
            ));
        }
    }
    Ok(())
}

fn validate_sink_names(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if !seen.insert(&sink.name) {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                format!("duplicate sink name '{}'", sink.name),
            ));
        }
    }
    Ok(())
}

fn validate_source_params(source: &SourceConfig) -> Result<(), ContractError> {
    let field = |key: &str| format!("sources[{}].params.{key}", source.id);
    match source.source_type {
        SourceType::Trace => {
            require(&source.params, "path", field)?;
            if let Some(speed) = parse_optional::<f64>(&source.params, "speed", field)? {
                if speed <= 0.0 {
                    return Err(ContractError::config_validation(
                        field("speed"),
                        format!("speed must be > 0, got {speed}"),
                    ));
                }
            }
            parse_optional::<bool>(&source.params, "realtime", field)?;
            parse_optional::<bool>(&source.params, "loop", field)?;
        }
        SourceType::Network => {
            require(&source.params, "host", field)?;
            parse_optional::<u16>(&source.params, "port", field)?;
        }
        SourceType::Simulated => {
            if let Some(hz) = parse_optional::<f64>(&source.params, "frequency_hz", field)? {
                if hz <= 0.0 {
                    return Err(ContractError::config_validation(
                        field("frequency_hz"),
                        format!("frequency_hz must be > 0, got {hz}"),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn validate_sink_params(sink: &SinkConfig) -> Result<(), ContractError> {
    let field = |key: &str| format!("sinks[{}].params.{key}", sink.name);
    match sink.sink_type {
        SinkType::Log => {}
        SinkType::Recorder => {
            require(&sink.params, "directory", field)?;
            parse_optional::<bool>(&sink.params, "rotate_hourly", field)?;
        }
        SinkType::Uploader => {
            let url = require(&sink.params, "url", field)?;
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ContractError::config_validation(
                    field("url"),
                    format!("url must be http(s), got '{url}'"),
                ));
            }
            for key in ["batch_size", "max_attempts", "max_pending_batches"] {
                if parse_optional::<usize>(&sink.params, key, field)? == Some(0) {
                    return Err(ContractError::config_validation(field(key), "must be > 0"));
                }
            }
            parse_optional::<u64>(&sink.params, "request_timeout_ms", field)?;
            parse_optional::<u64>(&sink.params, "flush_interval_ms", field)?;
        }
    }
    Ok(())
}

fn require<'a>(
    params: &'a HashMap<String, String>,
    key: &str,
    field: impl Fn(&str) -> String,
) -> Result<&'a str, ContractError> {
    match params.get(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ContractError::config_validation(
            field(key),
            "required parameter is missing",
        )),
    }
}

fn parse_optional<T: std::str::FromStr>(
    params: &HashMap<String, String>,
    key: &str,
    field: impl Fn(&str) -> String,
) -> Result<Option<T>, ContractError> {
    params
        .get(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| {
                ContractError::config_validation(field(key), format!("cannot parse '{raw}'"))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{MeasurementClass, MeasurementSpec, Unit};

    fn minimal_blueprint() -> PipelineBlueprint {
        PipelineBlueprint {
            sources: vec![SourceConfig {
                id: "trace".into(),
                source_type: SourceType::Trace,
                read_timeout_ms: 100,
                max_frame_len: 4096,
                params: HashMap::from([("path".to_string(), "drive.json".to_string())]),
            }],
            sinks: vec![SinkConfig {
                name: "log".into(),
                sink_type: SinkType::Log,
                queue_capacity: None,
                drain_timeout_ms: 1000,
                params: Default::default(),
            }],
            ..Default::default()
        }
    }

    fn uploader(url: &str) -> SinkConfig {
        SinkConfig {
            name: "upload".into(),
            sink_type: SinkType::Uploader,
            queue_capacity: Some(256),
            drain_timeout_ms: 1000,
            params: HashMap::from([("url".to_string(), url.to_string())]),
        }
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_duplicate_source_id() {
        let mut bp = minimal_blueprint();
        bp.sources.push(bp.sources[0].clone());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate source id"), "got: {err}");
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(bp.sinks[0].clone());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate sink name"), "got: {err}");
    }

    #[test]
    fn test_empty_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].name = String::new();
        let result = validate(&bp);
        assert!(matches!(result, Err(ContractError::ConfigValidation { .. })));
    }

    #[test]
    fn test_trace_requires_path() {
        let mut bp = minimal_blueprint();
        bp.sources[0].params.clear();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("params.path"), "got: {err}");
    }

    #[test]
    fn test_network_port_must_parse() {
        let mut bp = minimal_blueprint();
        bp.sources[0].source_type = SourceType::Network;
        bp.sources[0].params = HashMap::from([
            ("host".to_string(), "127.0.0.1".to_string()),
            ("port".to_string(), "http".to_string()),
        ]);
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("params.port"), "got: {err}");
    }

    #[test]
    fn test_uploader_url_rules() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(uploader("https://telemetry.example.com/records"));
        assert!(validate(&bp).is_ok());

        bp.sinks[1] = uploader("ftp://telemetry.example.com");
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("http(s)"), "got: {err}");

        bp.sinks[1] = uploader("http://localhost:8080");
        bp.sinks[1]
            .params
            .insert("batch_size".into(), "0".into());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("batch_size"), "got: {err}");
    }

    #[test]
    fn test_inverted_measurement_range() {
        let mut bp = minimal_blueprint();
        bp.measurements.push(MeasurementSpec {
            name: "coolant_temperature".into(),
            class: MeasurementClass::Numeric,
            unit: Unit::Undefined,
            minimum: Some(150.0),
            maximum: Some(-40.0),
            states: vec![],
        });
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("coolant_temperature"), "got: {err}");
    }
}
