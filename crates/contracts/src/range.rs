//! Closed numeric interval used for validity checks

use serde::{Deserialize, Serialize};

use crate::MeasurementError;

/// Closed interval `[minimum, maximum]`
///
/// Invariant: `minimum <= maximum`, both bounds are numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RangeBounds")]
pub struct Range {
    minimum: f64,
    maximum: f64,
}

/// Unchecked wire form, validated through [`Range::new`]
#[derive(Deserialize)]
struct RangeBounds {
    minimum: f64,
    maximum: f64,
}

impl TryFrom<RangeBounds> for Range {
    type Error = MeasurementError;

    fn try_from(bounds: RangeBounds) -> Result<Self, Self::Error> {
        Range::new(bounds.minimum, bounds.maximum)
    }
}

impl Range {
    /// Create a range, rejecting inverted or NaN bounds
    pub fn new(minimum: f64, maximum: f64) -> Result<Self, MeasurementError> {
        if minimum.is_nan() || maximum.is_nan() || minimum > maximum {
            return Err(MeasurementError::InvalidRange { minimum, maximum });
        }
        Ok(Self { minimum, maximum })
    }

    /// Built-in bounds, known to be ordered
    pub(crate) const fn bounded(minimum: f64, maximum: f64) -> Self {
        Self { minimum, maximum }
    }

    pub fn minimum(&self) -> f64 {
        self.minimum
    }

    pub fn maximum(&self) -> f64 {
        self.maximum
    }

    /// `minimum <= x <= maximum`; NaN is never contained
    pub fn contains(&self, x: f64) -> bool {
        self.minimum <= x && x <= self.maximum
    }

    /// Alias of [`Range::contains`]
    pub fn within(&self, x: f64) -> bool {
        self.contains(x)
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.minimum, self.maximum)
    }
}
