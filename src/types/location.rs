//! Last known location

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A position fix from the location provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// When the fix was taken
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Location {
    /// Create a fix stamped now
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp: Utc::now(),
        }
    }

    /// Link a contact can open on a phone
    pub fn maps_url(&self) -> String {
        format!(
            "https://maps.google.com/?q={},{}",
            self.latitude, self.longitude
        )
    }

    /// Latitude/longitude inside their valid ranges?
    pub fn is_plausible(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}
