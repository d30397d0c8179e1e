//! Measurement registry: name → kind lookup owned by a Vehicle

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    Measurement, MeasurementError, MeasurementKind, Range, RawMeasurement, RawRecord, RawValue,
    Unit,
};

const NUMERIC_KINDS: &[(&str, Unit, f64, f64)] = &[
    ("accelerator_pedal_position", Unit::Percentage, 0.0, 100.0),
    ("fuel_level", Unit::Percentage, 0.0, 100.0),
    ("vehicle_speed", Unit::KilometersPerHour, 0.0, 321.0),
    ("engine_speed", Unit::RotationsPerMinute, 0.0, 8000.0),
    ("fuel_consumed_since_restart", Unit::Litre, 0.0, 100.0),
    ("latitude", Unit::Degree, -90.0, 90.0),
    ("longitude", Unit::Degree, -180.0, 180.0),
    ("odometer", Unit::Kilometer, 0.0, 1_000_000.0),
    ("steering_wheel_angle", Unit::Degree, -600.0, 600.0),
    ("torque_at_transmission", Unit::NewtonMeter, -800.0, 1500.0),
    ("lateral_acceleration", Unit::MetersPerSecondSquared, -5.0, 5.0),
    ("longitudinal_acceleration", Unit::MetersPerSecondSquared, -5.0, 5.0),
];

const BOOLEAN_KINDS: &[&str] = &[
    "brake_pedal_status",
    "headlamp_status",
    "high_beam_status",
    "parking_brake_status",
    "windshield_wiper_status",
];

const STATEFUL_KINDS: &[(&str, &[&str])] = &[
    ("ignition_status", &["off", "accessory", "run", "start"]),
    (
        "transmission_gear_position",
        &[
            "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth",
            "neutral", "reverse", "park",
        ],
    ),
    ("turn_signal_status", &["off", "left", "right"]),
];

const EVENTED_KINDS: &[(&str, &[&str])] = &[
    ("button_event", &["up", "down", "left", "right", "ok"]),
    ("door_status", &["driver", "rear_left", "rear_right", "passenger"]),
];

/// Table of known measurement kinds
///
/// Built once, extended with [`register`](Self::register) while still owned,
/// then shared read-only (`Arc<MeasurementRegistry>`).
#[derive(Debug, Clone, Default)]
pub struct MeasurementRegistry {
    kinds: HashMap<String, Arc<MeasurementKind>>,
}

impl MeasurementRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in vehicle measurements
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for &(name, unit, min, max) in NUMERIC_KINDS {
            registry.register(MeasurementKind::numeric(name, unit, Range::bounded(min, max)));
        }
        for &name in BOOLEAN_KINDS {
            registry.register(MeasurementKind::boolean(name));
        }
        for &(name, states) in STATEFUL_KINDS {
            registry.register(MeasurementKind::stateful(name, states.iter().copied()));
        }
        for &(name, states) in EVENTED_KINDS {
            registry.register(MeasurementKind::evented(name, states.iter().copied()));
        }
        registry
    }

    /// Add or replace a kind; returns the previous one if replaced
    pub fn register(&mut self, kind: MeasurementKind) -> Option<Arc<MeasurementKind>> {
        self.kinds.insert(kind.name().to_string(), Arc::new(kind))
    }

    pub fn kind(&self, name: &str) -> Option<&Arc<MeasurementKind>> {
        self.kinds.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// Build a measurement by name
    pub fn create(
        &self,
        name: &str,
        value: &RawValue,
        event: Option<RawValue>,
        now: DateTime<Utc>,
    ) -> Result<Measurement, MeasurementError> {
        let kind = self
            .kind(name)
            .ok_or_else(|| MeasurementError::unrecognized(name))?;
        Measurement::new(Arc::clone(kind), value, event, now)
    }

    /// Translate a decoded measurement record
    pub fn from_measurement(
        &self,
        raw: &RawMeasurement,
        now: DateTime<Utc>,
    ) -> Result<Measurement, MeasurementError> {
        self.create(&raw.name, &raw.value, raw.event.clone(), now)
    }

    /// Translate any raw record
    ///
    /// Bus frames carry no measurement name and are reported as unrecognized.
    pub fn from_record(
        &self,
        raw: &RawRecord,
        now: DateTime<Utc>,
    ) -> Result<Measurement, MeasurementError> {
        match raw {
            RawRecord::Measurement(m) => self.from_measurement(m, now),
            RawRecord::CanMessage(_) => Err(MeasurementError::unrecognized(raw.name())),
        }
    }
}
