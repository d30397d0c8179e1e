//! NotifierSink - in-process listener callbacks per measurement name

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, instrument};

use contracts::{ContractError, Measurement, SinkHandler};

/// Listener callback; identity is the `Arc` allocation
pub type Listener = Arc<dyn Fn(&Measurement) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    by_name: HashMap<String, Vec<Listener>>,
    any: Vec<Listener>,
}

fn same(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

fn insert(list: &mut Vec<Listener>, listener: Listener) -> bool {
    if list.iter().any(|l| same(l, &listener)) {
        return false;
    }
    list.push(listener);
    true
}

fn remove(list: &mut Vec<Listener>, listener: &Listener) -> bool {
    let before = list.len();
    list.retain(|l| !same(l, listener));
    list.len() != before
}

/// Sink handler that invokes registered callbacks
///
/// Cloning shares the listener registry, so the owner keeps a handle for
/// (un)registration while a clone runs behind a `QueuedSink`.
#[derive(Clone)]
pub struct NotifierSink {
    name: String,
    listeners: Arc<RwLock<Listeners>>,
}

impl NotifierSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            listeners: Arc::default(),
        }
    }

    /// Call `listener` for every new value of `measurement`
    ///
    /// Returns `false` if this exact callback was already registered.
    pub fn register(&self, measurement: &str, listener: Listener) -> bool {
        let mut listeners = self.write();
        insert(
            listeners.by_name.entry(measurement.to_string()).or_default(),
            listener,
        )
    }

    /// No effect if the callback was never registered
    pub fn unregister(&self, measurement: &str, listener: &Listener) -> bool {
        let mut listeners = self.write();
        let Some(list) = listeners.by_name.get_mut(measurement) else {
            return false;
        };
        let removed = remove(list, listener);
        if list.is_empty() {
            listeners.by_name.remove(measurement);
        }
        removed
    }

    /// Call `listener` for every measurement
    pub fn register_any(&self, listener: Listener) -> bool {
        insert(&mut self.write().any, listener)
    }

    pub fn unregister_any(&self, listener: &Listener) -> bool {
        remove(&mut self.write().any, listener)
    }

    /// Number of callbacks registered for `measurement` (wildcards excluded)
    pub fn listener_count(&self, measurement: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_name
            .get(measurement)
            .map_or(0, Vec::len)
    }

    /// Invoke the current listeners of `measurement.name()`
    ///
    /// The list is copied before any callback runs, so callbacks may
    /// register or unregister. Returns the number of callbacks that panicked.
    pub fn notify(&self, measurement: &Measurement) -> usize {
        let snapshot: Vec<Listener> = {
            let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
            listeners
                .by_name
                .get(measurement.name())
                .into_iter()
                .flatten()
                .chain(listeners.any.iter())
                .cloned()
                .collect()
        };

        let mut panicked = 0;
        for listener in snapshot {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(measurement))).is_err() {
                panicked += 1;
                error!(
                    sink = %self.name,
                    measurement = measurement.name(),
                    "Listener panicked"
                );
            }
        }
        panicked
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Listeners> {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SinkHandler for NotifierSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "notifier_sink_handle",
        skip(self, measurement),
        fields(sink = %self.name, measurement = measurement.name())
    )]
    async fn handle(&mut self, measurement: &Measurement) -> Result<(), ContractError> {
        match self.notify(measurement) {
            0 => Ok(()),
            n => Err(ContractError::sink_write(
                &self.name,
                format!("{n} listener(s) panicked"),
            )),
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "notifier_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "NotifierSink closed");
        Ok(())
    }
}
