//! Detection configuration

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::{
    DEFAULT_COUNTDOWN_MS, DEFAULT_FALL_THRESHOLD, DEFAULT_FREE_FALL_RESET_MS,
    DEFAULT_IMPACT_THRESHOLD, DEFAULT_MAX_FREE_FALL_MS, DEFAULT_MIN_FREE_FALL_MS,
    DEFAULT_SENSITIVITY, SENSITIVITY_LOW_BELOW, SENSITIVITY_MEDIUM_BELOW,
};

/// Thresholds and windows read by the classifier and the countdown
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Spike above this is a potential impact (m/s²)
    pub fall_threshold: f64,
    /// Magnitude below this is free-fall (m/s²)
    pub impact_threshold: f64,
    pub min_free_fall_ms: u64,
    pub max_free_fall_ms: u64,
    /// Unresolved free-fall is abandoned after this long
    pub free_fall_reset_ms: u64,
    /// Delay before the alert goes out
    pub countdown_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            fall_threshold: DEFAULT_FALL_THRESHOLD,
            impact_threshold: DEFAULT_IMPACT_THRESHOLD,
            min_free_fall_ms: DEFAULT_MIN_FREE_FALL_MS,
            max_free_fall_ms: DEFAULT_MAX_FREE_FALL_MS,
            free_fall_reset_ms: DEFAULT_FREE_FALL_RESET_MS,
            countdown_ms: DEFAULT_COUNTDOWN_MS,
        }
    }
}

impl DetectionConfig {
    /// Check every invariant. Called at configuration time, never while classifying.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("fall_threshold", self.fall_threshold),
            ("impact_threshold", self.impact_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold { field, value });
            }
        }
        if self.impact_threshold >= self.fall_threshold {
            return Err(ConfigError::ThresholdOrder {
                impact: self.impact_threshold,
                fall: self.fall_threshold,
            });
        }
        for (field, value) in [
            ("min_free_fall_ms", self.min_free_fall_ms),
            ("max_free_fall_ms", self.max_free_fall_ms),
            ("free_fall_reset_ms", self.free_fall_reset_ms),
            ("countdown_ms", self.countdown_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDuration { field });
            }
        }
        if self.min_free_fall_ms >= self.max_free_fall_ms {
            return Err(ConfigError::EmptyWindow {
                min_ms: self.min_free_fall_ms,
                max_ms: self.max_free_fall_ms,
            });
        }
        Ok(())
    }

    /// Derive the fall threshold from a sensitivity slider position
    pub fn with_sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.fall_threshold = sensitivity.fall_threshold();
        self
    }

    /// Is `elapsed_ms` of free-fall long enough, and short enough, for a fall?
    pub fn in_free_fall_window(&self, elapsed_ms: u64) -> bool {
        (self.min_free_fall_ms..=self.max_free_fall_ms).contains(&elapsed_ms)
    }

    /// Apply a partial update, returning the merged (unvalidated) config
    pub fn merged(&self, update: &ConfigUpdate) -> Result<Self, ConfigError> {
        let mut next = *self;
        if let Some(s) = update.sensitivity {
            next = next.with_sensitivity(Sensitivity::new(s)?);
        }
        // explicit threshold wins over the sensitivity-derived one
        if let Some(v) = update.fall_threshold {
            next.fall_threshold = v;
        }
        if let Some(v) = update.impact_threshold {
            next.impact_threshold = v;
        }
        if let Some(v) = update.min_free_fall_ms {
            next.min_free_fall_ms = v;
        }
        if let Some(v) = update.max_free_fall_ms {
            next.max_free_fall_ms = v;
        }
        if let Some(v) = update.free_fall_reset_ms {
            next.free_fall_reset_ms = v;
        }
        if let Some(v) = update.countdown_ms {
            next.countdown_ms = v;
        }
        Ok(next)
    }
}

/// Partial configuration change. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fall_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_free_fall_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_free_fall_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_fall_reset_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown_ms: Option<u64>,
}

/// Fall sensitivity slider, 0.0 (fewest false alarms) to 1.0 (most responsive)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Sensitivity(f64);

impl Default for Sensitivity {
    fn default() -> Self {
        Sensitivity(DEFAULT_SENSITIVITY)
    }
}

impl Sensitivity {
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::SensitivityOutOfRange(value));
        }
        Ok(Sensitivity(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Higher sensitivity, lower spike needed. Default slider gives the default threshold.
    pub fn fall_threshold(&self) -> f64 {
        DEFAULT_FALL_THRESHOLD * (1.0 + DEFAULT_SENSITIVITY - self.0)
    }

    pub fn label(&self) -> &'static str {
        if self.0 < SENSITIVITY_LOW_BELOW {
            "Low"
        } else if self.0 < SENSITIVITY_MEDIUM_BELOW {
            "Medium"
        } else {
            "High"
        }
    }

    pub fn description(&self) -> &'static str {
        match self.label() {
            "Low" => "Low sensitivity (fewer false alarms)",
            "Medium" => "Medium sensitivity (balanced)",
            _ => "High sensitivity (more responsive)",
        }
    }
}
