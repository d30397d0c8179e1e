//! QueuedSink - isolates a sink handler behind a queue and worker task
//!
//! The producer side (`receive`) runs on source threads and never waits for
//! the consumer. One Tokio task per sink drains the queue in FIFO order.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, instrument, warn};

use contracts::{ContractError, DataSink, Measurement, SinkConfig, SinkHandler, SinkStop};

use crate::error::DispatcherError;
use crate::metrics::SinkMetrics;

/// Queue sizing and shutdown bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Bounded queue capacity; unbounded when `None`
    pub capacity: Option<usize>,
    /// Upper bound for draining the queue on stop
    pub drain_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            drain_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&SinkConfig> for QueueConfig {
    fn from(config: &SinkConfig) -> Self {
        Self {
            capacity: config.queue_capacity,
            drain_timeout: Duration::from_millis(config.drain_timeout_ms),
        }
    }
}

enum QueueSender {
    Bounded(mpsc::Sender<Measurement>),
    Unbounded(mpsc::UnboundedSender<Measurement>),
}

enum QueueReceiver {
    Bounded(mpsc::Receiver<Measurement>),
    Unbounded(mpsc::UnboundedReceiver<Measurement>),
}

impl QueueReceiver {
    async fn recv(&mut self) -> Option<Measurement> {
        match self {
            Self::Bounded(rx) => rx.recv().await,
            Self::Unbounded(rx) => rx.recv().await,
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Bounded(rx) => rx.len(),
            Self::Unbounded(rx) => rx.len(),
        }
    }
}

fn queue(capacity: Option<usize>) -> (QueueSender, QueueReceiver) {
    match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (QueueSender::Bounded(tx), QueueReceiver::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (QueueSender::Unbounded(tx), QueueReceiver::Unbounded(rx))
        }
    }
}

/// A sink handler running behind its own queue and worker task
pub struct QueuedSink {
    /// Sink name
    name: String,
    /// `None` once stopped
    tx: RwLock<Option<QueueSender>>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker: Mutex<Option<JoinHandle<()>>>,
    drain_timeout: Duration,
}

impl QueuedSink {
    /// Spawn the worker task for `handler`
    ///
    /// # Panics
    /// Outside a Tokio runtime.
    pub fn spawn<H: SinkHandler + 'static>(handler: H, config: QueueConfig) -> Self {
        let name = handler.name().to_string();
        let (tx, rx) = queue(config.capacity);
        let metrics = Arc::new(SinkMetrics::new(&name));

        let worker_metrics = Arc::clone(&metrics);
        let worker = tokio::spawn(async move {
            sink_worker(handler, rx, worker_metrics).await;
        });

        debug!(sink = %name, capacity = ?config.capacity, "Sink worker spawned");

        Self {
            name,
            tx: RwLock::new(Some(tx)),
            metrics,
            worker: Mutex::new(Some(worker)),
            drain_timeout: config.drain_timeout,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a measurement without waiting for the worker
    ///
    /// # Errors
    /// `QueueFull` when a bounded queue is at capacity (the item is dropped
    /// and counted), `Stopped` after `shutdown`.
    pub fn enqueue(&self, measurement: Measurement) -> Result<(), DispatcherError> {
        let guard = self.tx.read().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return Err(self.stopped());
        };

        let sent = match tx {
            QueueSender::Bounded(tx) => match tx.try_send(measurement) {
                Ok(()) => Ok(tx.max_capacity() - tx.capacity()),
                Err(mpsc::error::TrySendError::Full(m)) => {
                    self.metrics.inc_dropped();
                    warn!(sink = %self.name, measurement = m.name(), "Queue full, measurement dropped");
                    return Err(DispatcherError::QueueFull {
                        sink_name: self.name.clone(),
                        measurement: m.name().to_string(),
                    });
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(()),
            },
            QueueSender::Unbounded(tx) => tx.send(measurement).map(|()| 0).map_err(|_| ()),
        };

        match sent {
            Ok(len) => {
                self.metrics.inc_enqueued();
                if len > 0 {
                    self.metrics.set_queue_len(len);
                }
                Ok(())
            }
            Err(()) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                Err(self.stopped())
            }
        }
    }

    /// Close the queue, let the worker drain it, flush and close the handler
    ///
    /// Waits at most the drain timeout, then aborts the worker. Idempotent.
    #[instrument(name = "queued_sink_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(&self) {
        drop(
            self.tx
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut worker) = worker else {
            return;
        };

        match time::timeout(self.drain_timeout, &mut worker).await {
            Ok(Ok(())) => debug!(sink = %self.name, "QueuedSink shutdown complete"),
            Ok(Err(e)) => {
                self.metrics.inc_failures("drain");
                error!(sink = %self.name, error = %e, "Worker task panicked");
            }
            Err(_) => {
                worker.abort();
                self.metrics.inc_failures("drain");
                warn!(
                    sink = %self.name,
                    timeout_ms = self.drain_timeout.as_millis() as u64,
                    "Drain timed out, worker aborted"
                );
            }
        }
    }

    fn stopped(&self) -> DispatcherError {
        DispatcherError::Stopped {
            sink_name: self.name.clone(),
        }
    }
}

impl DataSink for QueuedSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&self, measurement: &Measurement) -> Result<(), ContractError> {
        self.enqueue(measurement.clone())
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    fn stop(&self) -> SinkStop<'_> {
        Box::pin(self.shutdown())
    }
}

/// Worker task that consumes measurements and drives the handler
#[instrument(
    name = "sink_worker_loop",
    skip(handler, rx, metrics),
    fields(sink = %handler.name())
)]
async fn sink_worker<H: SinkHandler>(
    mut handler: H,
    mut rx: QueueReceiver,
    metrics: Arc<SinkMetrics>,
) {
    let name = handler.name().to_string();
    debug!(sink = %name, "Sink worker started");

    let mut ticker = handler.flush_interval().map(|period| {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        let next = match ticker.as_mut() {
            Some(ticker) => tokio::select! {
                item = rx.recv() => item,
                _ = ticker.tick() => {
                    if let Err(e) = handler.flush().await {
                        metrics.inc_failures("flush");
                        error!(sink = %name, error = %e, "Periodic flush failed");
                    }
                    continue;
                }
            },
            None => rx.recv().await,
        };
        let Some(measurement) = next else {
            break;
        };
        metrics.set_queue_len(rx.len());

        match handler.handle(&measurement).await {
            Ok(()) => metrics.inc_processed(),
            Err(e) => {
                metrics.inc_failures("handle");
                error!(
                    sink = %name,
                    measurement = measurement.name(),
                    error = %e,
                    "Handle failed"
                );
                // keep going
            }
        }
    }

    if let Err(e) = handler.flush().await {
        metrics.inc_failures("flush");
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = handler.close().await {
        metrics.inc_failures("close");
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}
