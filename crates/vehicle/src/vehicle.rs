//! Vehicle - owns sources and sinks, translates raw records, fans out

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use contracts::{
    DataSink, Measurement, MeasurementError, MeasurementRegistry, RangePolicy, RawRecord,
    SourceRecord,
};
use dispatcher::{Listener, NotifierSink, QueueConfig, QueuedSink};
use ingestion::{DataSource, RecordHandler};

use crate::error::{Result, VehicleError};
use crate::metrics::{VehicleMetrics, VehicleMetricsSnapshot};

/// Name of the built-in listener sink
pub const NOTIFIER_SINK: &str = "notifier";

/// Vehicle configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct VehicleConfig {
    /// Out-of-range numeric values: flag (keep) or drop
    pub range_policy: RangePolicy,
    /// Queue of the built-in notifier sink
    pub notifier_queue: QueueConfig,
}

/// State shared with every source thread
struct Shared {
    registry: Arc<MeasurementRegistry>,
    latest: RwLock<HashMap<String, Measurement>>,
    sinks: RwLock<Vec<Arc<dyn DataSink>>>,
    metrics: VehicleMetrics,
    range_policy: RangePolicy,
}

impl Shared {
    fn receive(&self, raw: &RawRecord) -> Result<Measurement> {
        self.metrics.record_received();
        match self.translate(raw) {
            Ok(measurement) => {
                self.dispatch(&measurement);
                Ok(measurement)
            }
            Err(e) => {
                self.metrics.record_translation_error(e.kind_label());
                warn!(measurement = raw.name(), error = %e, "Record dropped");
                Err(e)
            }
        }
    }

    /// Validate, apply the range policy, then update the latest-value table
    fn translate(&self, raw: &RawRecord) -> Result<Measurement> {
        let now = Utc::now();
        let RawRecord::Measurement(raw) = raw else {
            return Err(MeasurementError::unrecognized(raw.name()).into());
        };
        let candidate = self.registry.from_measurement(raw, now)?;

        if candidate.within_range() == Some(false) {
            let dropped = self.range_policy == RangePolicy::Drop;
            self.metrics.record_out_of_range(candidate.name(), dropped);
            let value = candidate.value().as_f64().unwrap_or(f64::NAN);
            if dropped {
                return Err(VehicleError::OutOfRange {
                    name: candidate.name().to_string(),
                    value,
                });
            }
            warn!(measurement = candidate.name(), value, "Value outside valid range");
        }

        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        match latest.get_mut(&raw.name) {
            Some(existing) => {
                existing.update(&raw.value, raw.event.clone(), now)?;
                Ok(existing.clone())
            }
            None => {
                latest.insert(raw.name.clone(), candidate.clone());
                Ok(candidate)
            }
        }
    }

    fn dispatch(&self, measurement: &Measurement) {
        // no lock held while sinks run, so a sink may remove itself
        let sinks: Vec<Arc<dyn DataSink>> = self
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for sink in &sinks {
            match panic::catch_unwind(AssertUnwindSafe(|| sink.receive(measurement))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.metrics.record_sink_failure(sink.name());
                    warn!(
                        sink = sink.name(),
                        measurement = measurement.name(),
                        error = %e,
                        "Sink rejected measurement"
                    );
                }
                Err(_) => {
                    self.metrics.record_sink_failure(sink.name());
                    error!(
                        sink = sink.name(),
                        measurement = measurement.name(),
                        "Sink panicked in receive"
                    );
                }
            }
        }
        self.metrics.record_dispatched(measurement.name());
    }
}

/// Vehicle orchestrator
///
/// Sources call into the Vehicle from their own threads; every sink's
/// `receive` must be non-blocking. Create it inside a Tokio runtime.
pub struct Vehicle {
    shared: Arc<Shared>,
    sources: Mutex<Vec<Arc<DataSource>>>,
    notifier: NotifierSink,
}

impl Vehicle {
    /// Create a Vehicle with default settings
    ///
    /// # Panics
    /// Outside a Tokio runtime (the notifier worker is spawned here).
    pub fn new(registry: MeasurementRegistry) -> Self {
        Self::with_config(registry, VehicleConfig::default())
    }

    /// Create a Vehicle; the notifier sink is registered first
    pub fn with_config(registry: MeasurementRegistry, config: VehicleConfig) -> Self {
        let notifier = NotifierSink::new(NOTIFIER_SINK);
        let notifier_sink: Arc<dyn DataSink> =
            Arc::new(QueuedSink::spawn(notifier.clone(), config.notifier_queue));

        let shared = Arc::new(Shared {
            registry: Arc::new(registry),
            latest: RwLock::new(HashMap::new()),
            sinks: RwLock::new(vec![notifier_sink]),
            metrics: VehicleMetrics::new(),
            range_policy: config.range_policy,
        });

        debug!(range_policy = ?config.range_policy, "Vehicle created");
        Self {
            shared,
            sources: Mutex::new(Vec::new()),
            notifier,
        }
    }

    pub fn registry(&self) -> &MeasurementRegistry {
        &self.shared.registry
    }

    pub fn metrics(&self) -> VehicleMetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Register and start a source; its records flow into [`receive`](Self::receive)
    #[instrument(name = "vehicle_add_source", skip(self, source), fields(source = %source.id()))]
    pub fn add_source(&self, source: DataSource) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let handler: RecordHandler = Arc::new(move |record: SourceRecord| {
            // failures are already logged and counted
            let _ = shared.receive(&record.record);
        });
        source.start(handler)?;
        info!(source = %source.id(), "Source started");
        self.lock_sources().push(Arc::new(source));
        Ok(())
    }

    /// Ids of registered sources, in registration order
    pub fn source_ids(&self) -> Vec<String> {
        self.lock_sources()
            .iter()
            .map(|s| s.id().to_string())
            .collect()
    }

    /// Number of sources whose worker is still running
    pub fn active_sources(&self) -> usize {
        self.lock_sources().iter().filter(|s| s.is_running()).count()
    }

    /// Send raw bytes through a source's transport (command channel)
    pub fn write_to_source(&self, source_id: &str, data: &[u8]) -> Result<usize> {
        let source = self
            .lock_sources()
            .iter()
            .find(|s| s.id() == source_id)
            .cloned()
            .ok_or_else(|| VehicleError::UnknownSource(source_id.to_string()))?;
        Ok(source.write(data)?)
    }

    /// Append a sink; registration order is dispatch order
    pub fn add_sink(&self, sink: Arc<dyn DataSink>) {
        info!(sink = sink.name(), "Sink added");
        self.shared
            .sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    /// Remove the first sink named `name`; safe from inside its `receive`
    ///
    /// The removed sink is returned unstopped.
    pub fn remove_sink(&self, name: &str) -> Option<Arc<dyn DataSink>> {
        let mut sinks = self
            .shared
            .sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let index = sinks.iter().position(|s| s.name() == name)?;
        info!(sink = name, "Sink removed");
        Some(sinks.remove(index))
    }

    /// Names of registered sinks, in dispatch order
    pub fn sink_names(&self) -> Vec<String> {
        self.shared
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Translate one raw record and dispatch it
    ///
    /// # Errors
    /// Translation failures and policy drops; they are also logged and
    /// counted, and nothing is dispatched.
    pub fn receive(&self, raw: &RawRecord) -> Result<Measurement> {
        self.shared.receive(raw)
    }

    /// Hand a measurement to every sink, in registration order
    pub fn dispatch(&self, measurement: &Measurement) {
        self.shared.dispatch(measurement);
    }

    /// Latest value received for `name`
    pub fn get(&self, name: &str) -> Option<Measurement> {
        self.shared
            .latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Call `listener` for every new value of `name`
    ///
    /// # Errors
    /// `Unrecognized` when the registry has no such measurement.
    pub fn listen(&self, name: &str, listener: Listener) -> Result<()> {
        self.known(name)?;
        self.notifier.register(name, listener);
        Ok(())
    }

    pub fn unlisten(&self, name: &str, listener: &Listener) -> Result<()> {
        self.known(name)?;
        self.notifier.unregister(name, listener);
        Ok(())
    }

    /// Call `listener` for every measurement
    pub fn listen_all(&self, listener: Listener) {
        self.notifier.register_any(listener);
    }

    pub fn unlisten_all(&self, listener: &Listener) {
        self.notifier.unregister_any(listener);
    }

    /// Stop every source, then drain and stop every sink in order
    #[instrument(name = "vehicle_shutdown", skip(self))]
    pub async fn shutdown(&self) {
        let sources = std::mem::take(&mut *self.lock_sources());
        if !sources.is_empty() {
            let count = sources.len();
            let stopped = tokio::task::spawn_blocking(move || {
                for source in &sources {
                    source.stop();
                }
            })
            .await;
            match stopped {
                Ok(()) => info!(sources = count, "Sources stopped"),
                Err(e) => error!(error = %e, "Stopping sources failed"),
            }
        }

        let sinks = std::mem::take(
            &mut *self
                .shared
                .sinks
                .write()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for sink in &sinks {
            sink.stop().await;
            debug!(sink = sink.name(), "Sink stopped");
        }
        info!(sinks = sinks.len(), "Vehicle shutdown complete");
    }

    fn known(&self, name: &str) -> Result<()> {
        if self.shared.registry.contains(name) {
            Ok(())
        } else {
            Err(MeasurementError::unrecognized(name).into())
        }
    }

    fn lock_sources(&self) -> std::sync::MutexGuard<'_, Vec<Arc<DataSource>>> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Vehicle {
    fn drop(&mut self) {
        for source in self.lock_sources().iter() {
            source.stop();
        }
    }
}
