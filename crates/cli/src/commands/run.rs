//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use contracts::{PipelineBlueprint, RangePolicy};
use vehicle::{Vehicle, VehicleBuilder};

use crate::cli::RunArgs;

/// How often the run loop checks whether any source is still alive
const SOURCE_POLL: Duration = Duration::from_millis(500);

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.drop_out_of_range {
        info!("Overriding range policy from CLI: drop");
        blueprint.vehicle.range_policy = RangePolicy::Drop;
    }

    info!(
        measurements = blueprint.measurements.len(),
        sources = blueprint.sources.len(),
        sinks = blueprint.sinks.len(),
        range_policy = ?blueprint.vehicle.range_policy,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if blueprint.sources.is_empty() {
        warn!("No sources configured - nothing will be received");
    }

    let started = Instant::now();
    let vehicle = VehicleBuilder::from_blueprint(&blueprint)
        .context("Invalid vehicle configuration")?
        .build()
        .context("Failed to start vehicle")?;

    let duration = (args.duration > 0).then(|| Duration::from_secs(args.duration));
    info!(duration_secs = ?duration.map(|d| d.as_secs()), "Vehicle running");

    tokio::select! {
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping vehicle...");
        }
        _ = sleep_or_forever(duration) => {
            info!("Run duration elapsed");
        }
        _ = sources_finished(&vehicle), if !blueprint.sources.is_empty() => {
            info!("All sources finished");
        }
    }

    vehicle.shutdown().await;
    print_run_summary(&vehicle, started.elapsed());

    info!("Vehicle pipeline finished");
    Ok(())
}

async fn sleep_or_forever(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

async fn sources_finished(vehicle: &Vehicle) {
    loop {
        tokio::time::sleep(SOURCE_POLL).await;
        if vehicle.active_sources() == 0 {
            return;
        }
    }
}

/// Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_run_summary(vehicle: &Vehicle, elapsed: Duration) {
    let metrics = vehicle.metrics();
    println!("\n=== Run Summary ===\n");
    println!("  Duration: {:.2}s", elapsed.as_secs_f64());
    println!("  Records received: {}", metrics.records_received);
    println!("  Measurements dispatched: {}", metrics.measurements_dispatched);
    println!("  Translation errors: {}", metrics.translation_errors);
    println!("  Out-of-range values: {}", metrics.out_of_range);
    println!("  Sink failures: {}", metrics.sink_failures);
    println!();
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &PipelineBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Range policy: {:?}", blueprint.vehicle.range_policy);

    if !blueprint.measurements.is_empty() {
        println!("\nCustom measurements ({}):", blueprint.measurements.len());
        for m in &blueprint.measurements {
            println!("  - {} ({:?}, {})", m.name, m.class, m.unit.symbol());
        }
    }

    println!("\nSources ({}):", blueprint.sources.len());
    for source in &blueprint.sources {
        println!("  - {} ({:?})", source.id, source.source_type);
    }

    println!("\nSinks ({}):", blueprint.sinks.len());
    for sink in &blueprint.sinks {
        let queue = sink
            .queue_capacity
            .map_or_else(|| "unbounded".to_string(), |c| c.to_string());
        println!("  - {} ({:?}, queue {})", sink.name, sink.sink_type, queue);
    }

    println!();
}
