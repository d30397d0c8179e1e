//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Vehicle Pipeline - telemetry ingestion and fan-out
#[derive(Parser, Debug)]
#[command(
    name = "vehicle-pipeline",
    author,
    version,
    about = "Vehicle telemetry pipeline launcher",
    long_about = "Reads raw vehicle messages from the configured sources, translates them \n\
                  into typed measurements and fans them out to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "VEHICLE_PIPELINE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "VEHICLE_PIPELINE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default level when `RUST_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Prometheus port requested by the command, if any
    pub fn metrics_port(&self) -> Option<u16> {
        match &self.command {
            Commands::Run(args) if args.metrics_port != 0 => Some(args.metrics_port),
            _ => None,
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline until interrupted
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "pipeline.toml",
        env = "VEHICLE_PIPELINE_CONFIG"
    )]
    pub config: PathBuf,

    /// Stop after this many seconds (0 = run until interrupted)
    #[arg(long, default_value = "0", env = "VEHICLE_PIPELINE_DURATION")]
    pub duration: u64,

    /// Drop out-of-range numeric values instead of flagging them
    #[arg(long)]
    pub drop_out_of_range: bool,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "VEHICLE_PIPELINE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "vehicle-pipeline",
            "-v",
            "run",
            "--config",
            "drive.toml",
            "--duration",
            "30",
            "--metrics-port",
            "9000",
        ])
        .unwrap();

        assert_eq!(cli.log_level(), "debug");
        assert_eq!(cli.metrics_port(), Some(9000));
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("drive.toml"));
        assert_eq!(args.duration, 30);
        assert!(!args.drop_out_of_range);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["vehicle-pipeline", "-q", "-v", "validate"]).is_err());
        let cli = Cli::try_parse_from(["vehicle-pipeline", "-q", "validate"]).unwrap();
        assert_eq!(cli.log_level(), "warn");
        assert_eq!(cli.metrics_port(), None);
    }
}
