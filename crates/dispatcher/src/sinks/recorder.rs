//! RecorderSink - appends JSON lines to a per-session trace file

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Timelike};
use contracts::{ContractError, Formatter, JsonFormatter, Measurement, RawRecord, SinkHandler};
use tracing::{debug, error, info, instrument};

/// Default session filename pattern (chrono strftime)
pub const DEFAULT_FILENAME_PATTERN: &str = "%Y-%m-%d-%H%M%S";

/// Configuration for RecorderSink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Output directory, created on demand
    pub directory: PathBuf,
    /// strftime pattern for the file stem; `.json` is appended
    pub filename_pattern: String,
    /// Start a new file whenever the local hour changes
    pub rotate_hourly: bool,
}

impl RecorderConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            filename_pattern: DEFAULT_FILENAME_PATTERN.to_string(),
            rotate_hourly: false,
        }
    }

    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let directory = params
            .get("directory")
            .ok_or_else(|| "missing 'directory' parameter".to_string())?;

        let mut config = Self::new(directory);
        if let Some(pattern) = params.get("filename_pattern") {
            config.filename_pattern = pattern.clone();
        }
        if let Some(rotate) = params.get("rotate_hourly") {
            config.rotate_hourly = rotate
                .parse()
                .map_err(|_| format!("invalid rotate_hourly '{rotate}'"))?;
        }
        Ok(config)
    }
}

struct OpenFile {
    file: File,
    path: PathBuf,
    /// Local (date, hour) the file was opened in
    opened: (chrono::NaiveDate, u32),
}

/// Sink that records every measurement as one JSON line
pub struct RecorderSink {
    name: String,
    config: RecorderConfig,
    /// Names the first file of the session
    session_start: DateTime<Local>,
    output: Option<OpenFile>,
    formatter: JsonFormatter,
}

impl RecorderSink {
    /// Create a new RecorderSink; the file is opened on the first record
    pub fn new(name: impl Into<String>, config: RecorderConfig) -> Self {
        Self {
            name: name.into(),
            config,
            session_start: Local::now(),
            output: None,
            formatter: JsonFormatter,
        }
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = RecorderConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks[{name}].params"), e))?;
        Ok(Self::new(name, config))
    }

    /// Path of the file currently being written, if any
    pub fn current_path(&self) -> Option<&Path> {
        self.output.as_ref().map(|o| o.path.as_path())
    }

    fn open(&self, at: DateTime<Local>) -> std::io::Result<OpenFile> {
        fs::create_dir_all(&self.config.directory)?;
        let mut stem = String::new();
        write!(stem, "{}", at.format(&self.config.filename_pattern)).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid filename pattern '{}'", self.config.filename_pattern),
            )
        })?;
        let path = self.config.directory.join(format!("{stem}.json"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(sink = %self.name, path = %path.display(), "Recording session file opened");
        Ok(OpenFile {
            file,
            path,
            opened: (at.date_naive(), at.hour()),
        })
    }

    fn writer(&mut self) -> std::io::Result<&mut OpenFile> {
        let now = Local::now();
        let rotate = match &self.output {
            None => true,
            Some(output) => {
                self.config.rotate_hourly && output.opened != (now.date_naive(), now.hour())
            }
        };
        if rotate {
            let at = if self.output.is_none() {
                self.session_start
            } else {
                now
            };
            self.output = Some(self.open(at)?);
        }
        // just opened above when absent
        self.output
            .as_mut()
            .ok_or_else(|| std::io::Error::other("recorder output unavailable"))
    }

    fn write_line(&mut self, measurement: &Measurement) -> std::io::Result<()> {
        let mut line = self
            .formatter
            .serialize(&RawRecord::Measurement(measurement.to_record()))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        line.push(b'\n');

        let output = self.writer()?;
        output.file.write_all(&line)?;
        output.file.flush()
    }

    fn persist(&mut self, measurement: &Measurement) -> Result<(), ContractError> {
        self.write_line(measurement).map_err(|e| {
            error!(sink = %self.name, measurement = measurement.name(), error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }
}

impl SinkHandler for RecorderSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "recorder_sink_handle",
        skip(self, measurement),
        fields(sink = %self.name, measurement = measurement.name())
    )]
    async fn handle(&mut self, measurement: &Measurement) -> Result<(), ContractError> {
        self.persist(measurement)
    }

    #[instrument(name = "recorder_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(output) = self.output.as_mut() {
            output
                .file
                .sync_data()
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        }
        Ok(())
    }

    #[instrument(name = "recorder_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(output) = self.output.take() {
            debug!(sink = %self.name, path = %output.path.display(), "RecorderSink closed");
        }
        Ok(())
    }
}
