//! Error types
//!
//! Nothing here is fatal to monitoring: sample errors drop the sample,
//! delivery errors become alert outcomes, config errors go back to the caller.

use thiserror::Error;

/// Rejected configuration. The previous configuration stays in effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// impact threshold must sit strictly below the fall threshold
    #[error("impact threshold {impact} must be below fall threshold {fall}")]
    ThresholdOrder { impact: f64, fall: f64 },

    /// Threshold is negative, NaN or infinite
    #[error("{field} must be a finite non-negative number, got {value}")]
    InvalidThreshold { field: &'static str, value: f64 },

    /// Duration of zero
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    /// minFreeFall must be shorter than maxFreeFall
    #[error("free-fall window is empty: min {min_ms}ms >= max {max_ms}ms")]
    EmptyWindow { min_ms: u64, max_ms: u64 },

    /// Sensitivity slider outside [0, 1]
    #[error("sensitivity must be within 0.0..=1.0, got {0}")]
    SensitivityOutOfRange(f64),
}

/// Sensor anomaly, the sample is dropped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    /// Timestamp not strictly after the previous accepted sample
    #[error("non-monotonic timestamp {got_ms}ms (last accepted {last_ms}ms)")]
    NonMonotonic { last_ms: u64, got_ms: u64 },

    /// Magnitude is negative, NaN or infinite
    #[error("invalid magnitude {0}")]
    InvalidMagnitude(f64),
}

/// Failure reported by a transport for one recipient
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Gateway answered with a non-success status
    #[error("gateway rejected message with status {0}")]
    Rejected(u16),

    /// Network or I/O failure
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Monitor-level refusal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// An alert cycle is already pending
    #[error("an alert cycle is already active")]
    CycleActive,

    /// Monitoring is switched off
    #[error("fall monitoring is paused")]
    Paused,

    /// Sample was dropped at the classifier boundary
    #[error("sample dropped: {0}")]
    Dropped(String),
}

impl From<SampleError> for MonitorError {
    fn from(err: SampleError) -> Self {
        MonitorError::Dropped(err.to_string())
    }
}

/// Contact/config file errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    /// Slot number outside 1..=MAX_CONTACTS
    #[error("contact slot {0} does not exist")]
    NoSuchSlot(usize),

    #[error("invalid phone number: {0:?}")]
    InvalidPhone(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
