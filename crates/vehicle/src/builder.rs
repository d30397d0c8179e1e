//! VehicleBuilder - assembles a Vehicle from a pipeline blueprint

use std::sync::Arc;

use tracing::{info, instrument};

use contracts::{MeasurementRegistry, PipelineBlueprint, SinkConfig, SourceConfig};

use crate::error::Result;
use crate::vehicle::{Vehicle, VehicleConfig};

/// Builder for creating a Vehicle
pub struct VehicleBuilder {
    registry: MeasurementRegistry,
    config: VehicleConfig,
    sinks: Vec<SinkConfig>,
    sources: Vec<SourceConfig>,
}

impl VehicleBuilder {
    /// Start from a registry with no sources or sinks
    pub fn new(registry: MeasurementRegistry) -> Self {
        Self {
            registry,
            config: VehicleConfig::default(),
            sinks: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Standard kinds plus the blueprint's custom kinds, sinks and sources
    ///
    /// A custom kind with a built-in name replaces the built-in one.
    pub fn from_blueprint(blueprint: &PipelineBlueprint) -> Result<Self> {
        let mut registry = MeasurementRegistry::standard();
        for spec in &blueprint.measurements {
            if registry.register(spec.to_kind()?).is_some() {
                info!(measurement = %spec.name, "Built-in measurement kind replaced");
            }
        }

        let mut builder = Self::new(registry);
        builder.config.range_policy = blueprint.vehicle.range_policy;
        builder.sinks = blueprint.sinks.clone();
        builder.sources = blueprint.sources.clone();
        Ok(builder)
    }

    pub fn config(mut self, config: VehicleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sink(mut self, sink: SinkConfig) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn source(mut self, source: SourceConfig) -> Self {
        self.sources.push(source);
        self
    }

    /// Create sinks (in order) and then start sources
    ///
    /// Must be called inside a Tokio runtime.
    #[instrument(
        name = "vehicle_builder_build",
        skip(self),
        fields(sinks = self.sinks.len(), sources = self.sources.len())
    )]
    pub fn build(self) -> Result<Vehicle> {
        let vehicle = Vehicle::with_config(self.registry, self.config);

        for config in &self.sinks {
            let sink = dispatcher::create_sink(config)?;
            vehicle.add_sink(Arc::new(sink));
        }
        for config in &self.sources {
            let source = ingestion::create_source(config)?;
            vehicle.add_source(source)?;
        }

        info!(
            sinks = self.sinks.len(),
            sources = self.sources.len(),
            measurements = vehicle.registry().len(),
            "Vehicle built"
        );
        Ok(vehicle)
    }
}
