//! Symbolic measurement units (descriptive only, never converted)

use serde::{Deserialize, Serialize};

/// Unit tag carried by every measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Percentage,
    Meter,
    Kilometer,
    KilometersPerHour,
    RotationsPerMinute,
    Litre,
    Degree,
    NewtonMeter,
    MetersPerSecondSquared,
    #[default]
    Undefined,
}

impl Unit {
    /// Short symbol, e.g. `km/h`
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Percentage => "%",
            Self::Meter => "m",
            Self::Kilometer => "km",
            Self::KilometersPerHour => "km/h",
            Self::RotationsPerMinute => "rpm",
            Self::Litre => "L",
            Self::Degree => "deg",
            Self::NewtonMeter => "Nm",
            Self::MetersPerSecondSquared => "m/s^2",
            Self::Undefined => "undef",
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}
