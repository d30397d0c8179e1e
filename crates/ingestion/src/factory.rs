//! Source factory: SourceConfig → DataSource

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use contracts::{JsonFormatter, SourceConfig, SourceType, Transport};
use tracing::info;

use crate::config::SourceSettings;
use crate::error::{IngestionError, Result};
use crate::source::DataSource;
use crate::transports::{
    NetworkTransport, SimulatedConfig, SimulatedTransport, TraceOptions, TraceTransport,
    DEFAULT_PORT,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Build a (not yet started) source from configuration
///
/// # Errors
/// Missing or malformed params, unreadable trace file, unreachable host.
pub fn create_source(config: &SourceConfig) -> Result<DataSource> {
    let params = Params {
        source_id: &config.id,
        params: &config.params,
    };

    let transport: Box<dyn Transport> = match config.source_type {
        SourceType::Trace => {
            let defaults = TraceOptions::default();
            let options = TraceOptions {
                realtime: params.parse_or("realtime", defaults.realtime)?,
                speed: params.parse_or("speed", defaults.speed)?,
                loop_playback: params.parse_or("loop", defaults.loop_playback)?,
            };
            Box::new(TraceTransport::open(params.require("path")?, options)?)
        }
        SourceType::Network => {
            let host = params.require("host")?;
            let port = params.parse_or("port", DEFAULT_PORT)?;
            Box::new(NetworkTransport::connect(host, port, CONNECT_TIMEOUT)?)
        }
        SourceType::Simulated => {
            let defaults = SimulatedConfig::default();
            let simulated = SimulatedConfig {
                frequency_hz: params.parse_or("frequency_hz", defaults.frequency_hz)?,
                seed: params.parse_opt("seed")?,
            };
            Box::new(SimulatedTransport::new(config.id.clone(), simulated))
        }
    };

    info!(
        source = %config.id,
        source_type = ?config.source_type,
        transport = transport.name(),
        "created data source"
    );

    Ok(DataSource::with_settings(
        config.id.as_str(),
        transport,
        Arc::new(JsonFormatter),
        SourceSettings::from(config),
    ))
}

struct Params<'a> {
    source_id: &'a str,
    params: &'a HashMap<String, String>,
}

impl<'a> Params<'a> {
    fn require(&self, key: &str) -> Result<&'a str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| IngestionError::invalid_param(self.source_id, key, "missing"))
    }

    fn parse_opt<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        self.params
            .get(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|_| {
                    IngestionError::invalid_param(self.source_id, key, format!("cannot parse '{raw}'"))
                })
            })
            .transpose()
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.parse_opt(key)?.unwrap_or(default))
    }
}
