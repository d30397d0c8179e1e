//! Measurement model
//!
//! A measurement kind is data (name, unit, capability class), not a type:
//! kinds live in a [`MeasurementRegistry`](crate::MeasurementRegistry) and every
//! [`Measurement`] shares its kind through an `Arc`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{AgingData, MeasurementError, Range, RawMeasurement, RawValue, Unit};

/// Capability class of a measurement kind
#[derive(Debug, Clone, PartialEq)]
pub enum KindClass {
    /// Real value with an advisory validity range
    Numeric { valid_range: Range },
    /// true / false
    Boolean,
    /// One of a fixed set of string states
    Stateful { states: Vec<String> },
    /// Stateful, plus a transient event payload on each update
    Evented { states: Vec<String> },
}

impl KindClass {
    fn label(&self) -> &'static str {
        match self {
            Self::Numeric { .. } => "number",
            Self::Boolean => "boolean",
            Self::Stateful { .. } | Self::Evented { .. } => "state",
        }
    }
}

/// Static description of one named measurement
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementKind {
    name: String,
    unit: Unit,
    class: KindClass,
}

impl MeasurementKind {
    pub fn numeric(name: impl Into<String>, unit: Unit, valid_range: Range) -> Self {
        Self {
            name: name.into(),
            unit,
            class: KindClass::Numeric { valid_range },
        }
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: Unit::Undefined,
            class: KindClass::Boolean,
        }
    }

    pub fn stateful<I, S>(name: impl Into<String>, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            unit: Unit::Undefined,
            class: KindClass::Stateful {
                states: states.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn evented<I, S>(name: impl Into<String>, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            unit: Unit::Undefined,
            class: KindClass::Evented {
                states: states.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn class(&self) -> &KindClass {
        &self.class
    }

    /// Validity range, numeric kinds only
    pub fn valid_range(&self) -> Option<Range> {
        match &self.class {
            KindClass::Numeric { valid_range } => Some(*valid_range),
            _ => None,
        }
    }

    /// State enumeration, stateful and evented kinds only
    pub fn states(&self) -> Option<&[String]> {
        match &self.class {
            KindClass::Stateful { states } | KindClass::Evented { states } => Some(states),
            _ => None,
        }
    }

    /// Whether `state` belongs to this kind's enumeration
    pub fn valid_state(&self, state: &str) -> bool {
        self.states()
            .is_some_and(|states| states.iter().any(|s| s == state))
    }

    pub fn is_evented(&self) -> bool {
        matches!(self.class, KindClass::Evented { .. })
    }

    /// Convert a raw value into this kind's typed value
    pub(crate) fn coerce(&self, raw: &RawValue) -> Result<MeasurementValue, MeasurementError> {
        match (&self.class, raw) {
            (KindClass::Numeric { .. }, RawValue::Number(x)) => {
                if x.is_finite() {
                    Ok(MeasurementValue::Number(*x))
                } else {
                    Err(self.non_finite())
                }
            }
            (KindClass::Boolean, RawValue::Boolean(b)) => Ok(MeasurementValue::Boolean(*b)),
            (KindClass::Stateful { .. } | KindClass::Evented { .. }, RawValue::Text(state)) => {
                if self.valid_state(state) {
                    Ok(MeasurementValue::State(state.clone()))
                } else {
                    Err(MeasurementError::invalid_state(&self.name, state))
                }
            }
            (class, raw) => Err(MeasurementError::ValueType {
                name: self.name.clone(),
                expected: class.label(),
                found: raw.type_name(),
            }),
        }
    }

    /// Event payloads must survive serialization like values do
    fn check_event(&self, event: Option<&RawValue>) -> Result<(), MeasurementError> {
        match event {
            Some(RawValue::Number(x)) if !x.is_finite() => Err(self.non_finite()),
            _ => Ok(()),
        }
    }

    fn non_finite(&self) -> MeasurementError {
        MeasurementError::NonFinite {
            name: self.name.clone(),
        }
    }
}

/// Typed measurement payload
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementValue {
    Number(f64),
    Boolean(bool),
    State(String),
}

impl MeasurementValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_state(&self) -> Option<&str> {
        match self {
            Self::State(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_raw(&self) -> RawValue {
        match self {
            Self::Number(x) => RawValue::Number(*x),
            Self::Boolean(b) => RawValue::Boolean(*b),
            Self::State(s) => RawValue::Text(s.clone()),
        }
    }
}

impl std::fmt::Display for MeasurementValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(x) => write!(f, "{x}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::State(s) => f.write_str(s),
        }
    }
}

/// A named, typed, timestamped vehicle data point
///
/// Equality compares name, value and event; timestamps are ignored.
#[derive(Debug, Clone)]
pub struct Measurement {
    kind: Arc<MeasurementKind>,
    value: AgingData<MeasurementValue>,
    event: Option<RawValue>,
}

impl Measurement {
    /// Build from a raw value, validated against `kind`
    pub fn new(
        kind: Arc<MeasurementKind>,
        value: &RawValue,
        event: Option<RawValue>,
        now: DateTime<Utc>,
    ) -> Result<Self, MeasurementError> {
        let value = kind.coerce(value)?;
        let event = if kind.is_evented() { event } else { None };
        kind.check_event(event.as_ref())?;
        Ok(Self {
            kind,
            value: AgingData::new(value, now),
            event,
        })
    }

    pub fn name(&self) -> &str {
        self.kind.name()
    }

    pub fn unit(&self) -> Unit {
        self.kind.unit()
    }

    pub fn kind(&self) -> &MeasurementKind {
        &self.kind
    }

    pub fn value(&self) -> &MeasurementValue {
        self.value.value()
    }

    /// Transient event payload (evented kinds)
    pub fn event(&self) -> Option<&RawValue> {
        self.event.as_ref()
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.value.last_update()
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        self.value.age(now)
    }

    pub fn valid_range(&self) -> Option<Range> {
        self.kind.valid_range()
    }

    /// Range membership of a numeric value; `None` for other kinds
    ///
    /// Advisory only: out-of-range values are stored as observed.
    pub fn within_range(&self) -> Option<bool> {
        let range = self.kind.valid_range()?;
        self.value().as_f64().map(|x| range.contains(x))
    }

    pub fn valid_state(&self, state: &str) -> bool {
        self.kind.valid_state(state)
    }

    /// Apply a new observation in place
    ///
    /// # Errors
    /// `InvalidState` or `ValueType`; the previous value and timestamp are kept.
    pub fn update(
        &mut self,
        value: &RawValue,
        event: Option<RawValue>,
        now: DateTime<Utc>,
    ) -> Result<(), MeasurementError> {
        let value = self.kind.coerce(value)?;
        if self.kind.is_evented() {
            self.kind.check_event(event.as_ref())?;
        }
        self.value.set(value, now);
        if self.kind.is_evented() {
            self.event = event;
        }
        Ok(())
    }

    /// Raw form used by the formatter (recorder, uploader)
    pub fn to_record(&self) -> RawMeasurement {
        let micros = self.last_update().timestamp_micros();
        RawMeasurement {
            name: self.name().to_string(),
            value: self.value().to_raw(),
            event: self.event.clone(),
            timestamp: Some(micros as f64 / 1_000_000.0),
        }
    }
}

impl PartialEq for Measurement {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name() && self.value() == other.value() && self.event == other.event
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.unit() {
            Unit::Undefined => write!(f, "{}: {}", self.name(), self.value()),
            unit => write!(f, "{}: {} {}", self.name(), self.value(), unit),
        }
    }
}
