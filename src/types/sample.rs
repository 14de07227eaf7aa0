//! Acceleration samples

use serde::{Deserialize, Serialize};

/// Raw tri-axial reading as delivered by a sensor source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelReading {
    /// Monotonic timestamp (milliseconds since stream start)
    #[serde(rename = "t")]
    pub timestamp_ms: u64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelReading {
    /// Create new reading
    pub fn new(timestamp_ms: u64, x: f64, y: f64, z: f64) -> Self {
        Self { timestamp_ms, x, y, z }
    }

    /// Reduce to a magnitude sample
    pub fn to_sample(&self) -> Sample {
        Sample::from_axes(self.timestamp_ms, self.x, self.y, self.z)
    }
}

/// Acceleration magnitude at an instant. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Monotonic timestamp (milliseconds)
    pub timestamp_ms: u64,
    /// sqrt(x² + y² + z²), m/s²
    pub magnitude: f64,
}

impl Sample {
    /// Create sample from a precomputed magnitude
    pub fn new(timestamp_ms: u64, magnitude: f64) -> Self {
        Self { timestamp_ms, magnitude }
    }

    /// Create sample from three orthogonal axes
    pub fn from_axes(timestamp_ms: u64, x: f64, y: f64, z: f64) -> Self {
        Self {
            timestamp_ms,
            magnitude: (x * x + y * y + z * z).sqrt(),
        }
    }

    /// Magnitude usable for classification?
    pub fn is_valid(&self) -> bool {
        self.magnitude.is_finite() && self.magnitude >= 0.0
    }
}

impl From<AccelReading> for Sample {
    fn from(reading: AccelReading) -> Self {
        reading.to_sample()
    }
}
