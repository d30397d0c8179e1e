//! Value container that knows when it was last updated

use std::time::Duration;

use chrono::{DateTime, Utc};

/// A value plus the time of its last update
#[derive(Debug, Clone, PartialEq)]
pub struct AgingData<T> {
    value: T,
    last_update: DateTime<Utc>,
}

impl<T> AgingData<T> {
    /// Wrap a value observed at `now`
    pub fn new(value: T, now: DateTime<Utc>) -> Self {
        Self {
            value,
            last_update: now,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    /// `now - last_update`, zero if `now` precedes the update
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_update).to_std().unwrap_or(Duration::ZERO)
    }

    /// Replace the value; only the owning measurement may call this
    pub(crate) fn set(&mut self, value: T, now: DateTime<Utc>) {
        self.value = value;
        self.last_update = now;
    }
}
