//! DataSource - one transport, one worker thread
//!
//! The worker reads with a bounded timeout, frames, decodes and calls the
//! handler synchronously before the next read, so a slow handler slows the
//! reader instead of growing a queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use contracts::{Formatter, JsonFormatter, SourceRecord, Transport, TransportRead};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{SourceMetrics, SourceMetricsSnapshot, SourceSettings};
use crate::error::{IngestionError, Result};
use crate::framing::{Frame, LineFramer};

/// Callback receiving every decoded record, on the source thread
pub type RecordHandler = Arc<dyn Fn(SourceRecord) + Send + Sync>;

/// Source lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Created,
    Running,
    Stopped,
}

struct Shared {
    id: Arc<str>,
    running: AtomicBool,
    state: Mutex<SourceState>,
    metrics: SourceMetrics,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, SourceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A raw data source driven by its own OS thread
pub struct DataSource {
    shared: Arc<Shared>,
    settings: SourceSettings,
    formatter: Arc<dyn Formatter>,
    transport: Arc<Mutex<Box<dyn Transport>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DataSource {
    /// Create a JSON source over `transport`
    pub fn new(id: impl Into<Arc<str>>, transport: Box<dyn Transport>) -> Self {
        Self::with_settings(id, transport, Arc::new(JsonFormatter), SourceSettings::default())
    }

    pub fn with_settings(
        id: impl Into<Arc<str>>,
        transport: Box<dyn Transport>,
        formatter: Arc<dyn Formatter>,
        settings: SourceSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: id.into(),
                running: AtomicBool::new(false),
                state: Mutex::new(SourceState::Created),
                metrics: SourceMetrics::new(),
            }),
            settings,
            formatter,
            transport: Arc::new(Mutex::new(transport)),
            worker: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn state(&self) -> SourceState {
        *self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == SourceState::Running
    }

    pub fn metrics(&self) -> SourceMetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Start the worker thread
    ///
    /// # Errors
    /// `AlreadyStarted` unless the source is in `Created` state.
    #[instrument(name = "data_source_start", skip(self, handler), fields(source = %self.shared.id))]
    pub fn start(&self, handler: RecordHandler) -> Result<()> {
        let mut state = self.shared.state();
        if *state != SourceState::Created {
            return Err(IngestionError::AlreadyStarted {
                source_id: self.shared.id.to_string(),
            });
        }

        self.shared.running.store(true, Ordering::SeqCst);
        let worker = Worker {
            shared: Arc::clone(&self.shared),
            settings: self.settings.clone(),
            formatter: Arc::clone(&self.formatter),
            transport: Arc::clone(&self.transport),
            handler,
        };

        let spawned = thread::Builder::new()
            .name(format!("source-{}", self.shared.id))
            .spawn(move || worker.run());
        match spawned {
            Ok(handle) => {
                *state = SourceState::Running;
                *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                Ok(())
            }
            Err(source) => {
                self.shared.running.store(false, Ordering::SeqCst);
                *state = SourceState::Stopped;
                Err(IngestionError::Spawn {
                    source_id: self.shared.id.to_string(),
                    source,
                })
            }
        }
    }

    /// Stop the worker and wait for it to exit
    ///
    /// Idempotent. Returns within one read timeout plus the in-flight handler
    /// call. Called from the worker itself (inside the handler) it only signals.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                debug!(source = %self.shared.id, "stop requested from worker thread");
            } else if handle.join().is_err() {
                warn!(source = %self.shared.id, "data source worker panicked");
            }
        }

        let mut state = self.shared.state();
        if *state == SourceState::Created {
            *state = SourceState::Stopped;
        }
    }

    /// Send raw bytes to the device (command channel)
    ///
    /// Waits at most one read timeout for the worker to release the transport.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let mut transport = self.transport.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(transport.write(data)?)
    }
}

impl Drop for DataSource {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish()
    }
}

struct Worker {
    shared: Arc<Shared>,
    settings: SourceSettings,
    formatter: Arc<dyn Formatter>,
    transport: Arc<Mutex<Box<dyn Transport>>>,
    handler: RecordHandler,
}

/// Marks the source stopped however the worker exits, panics included
struct StoppedOnExit<'a>(&'a Shared);

impl Drop for StoppedOnExit<'_> {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
        *self.0.state() = SourceState::Stopped;
    }
}

impl Worker {
    fn run(self) {
        let _guard = StoppedOnExit(&self.shared);
        let id = &self.shared.id;
        let mut framer = LineFramer::new(self.settings.max_frame_len);
        let mut sequence = 0u64;

        info!(source = %id, "data source started");

        while self.shared.running.load(Ordering::Acquire) {
            let read = {
                let mut transport = self.transport.lock().unwrap_or_else(PoisonError::into_inner);
                transport.read(self.settings.read_timeout)
            };

            match read {
                Ok(TransportRead::Data(bytes)) => {
                    self.shared.metrics.record_bytes(id, bytes.len());
                    for frame in framer.push(&bytes) {
                        if !self.shared.running.load(Ordering::Acquire) {
                            break;
                        }
                        self.deliver(frame, &mut sequence);
                    }
                }
                Ok(TransportRead::Idle) => {}
                Ok(TransportRead::Closed) => {
                    if let Some(frame) = framer.finish() {
                        self.deliver(frame, &mut sequence);
                    }
                    info!(source = %id, records = sequence, "end of stream");
                    break;
                }
                Err(e) => {
                    self.shared.metrics.record_read_error(id);
                    error!(source = %id, error = %e, "transport read failed, stopping source");
                    break;
                }
            }
        }

        debug!(source = %id, records = sequence, "data source stopped");
    }

    fn deliver(&self, frame: Frame, sequence: &mut u64) {
        let id = &self.shared.id;
        let data = match frame {
            Frame::Complete(data) => data,
            Frame::Oversized(len) => {
                self.shared.metrics.record_corrupted(id);
                warn!(source = %id, len, max = self.settings.max_frame_len, "oversized frame discarded");
                return;
            }
        };

        match self.formatter.deserialize(&data) {
            Ok(record) => {
                *sequence += 1;
                self.shared.metrics.record_delivered(id);
                (self.handler)(SourceRecord {
                    source_id: Arc::clone(id),
                    sequence: *sequence,
                    record,
                });
            }
            Err(e) => {
                self.shared.metrics.record_corrupted(id);
                debug!(source = %id, error = %e, "corrupted frame");
            }
        }
    }
}
