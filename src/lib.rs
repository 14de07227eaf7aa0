//! FallSentry: fall detection engine for an accessibility assistant
//!
//! Pipeline: samples → SignalBuffer → classifier → FallDetector →
//! Countdown → AlertDispatcher (reads LocationCache, writes to a Transport)

pub mod core;
pub mod error;
pub mod types;

// =============================================================================
// DETECTION THRESHOLDS [m/s²]
// =============================================================================

/// Magnitude above which a spike counts as an impact
pub const DEFAULT_FALL_THRESHOLD: f64 = 15.0;

/// Magnitude below which the device is considered in free-fall
pub const DEFAULT_IMPACT_THRESHOLD: f64 = 2.0;

/// Standard gravity, what a device at rest reads
pub const STANDARD_GRAVITY: f64 = 9.81;

// =============================================================================
// TIMING WINDOWS (milliseconds)
// =============================================================================

/// Shortest free-fall that can precede a real fall
pub const DEFAULT_MIN_FREE_FALL_MS: u64 = 100;

/// Longest free-fall that can precede a real fall
pub const DEFAULT_MAX_FREE_FALL_MS: u64 = 800;

/// Free-fall with no impact is abandoned after this long
pub const DEFAULT_FREE_FALL_RESET_MS: u64 = 1000;

/// Cancellable delay between confirmed fall and alert dispatch
/// 10 seconds - long enough to say "cancel"
pub const DEFAULT_COUNTDOWN_MS: u64 = 10_000;

// =============================================================================
// SENSITIVITY
// =============================================================================

/// Default slider position (0.0 = least sensitive, 1.0 = most)
pub const DEFAULT_SENSITIVITY: f64 = 0.7;

/// Below this the sensitivity reads as "Low"
pub const SENSITIVITY_LOW_BELOW: f64 = 0.5;

/// Below this (and not low) the sensitivity reads as "Medium"
pub const SENSITIVITY_MEDIUM_BELOW: f64 = 0.8;

// =============================================================================
// CAPACITIES
// =============================================================================

/// Number of emergency contact slots
pub const MAX_CONTACTS: usize = 3;

/// Samples retained by the signal buffer (~5s at 50 Hz)
pub const SIGNAL_BUFFER_CAPACITY: usize = 256;

/// Vibration pattern played on a confirmed fall: wait, buzz, pause, buzz (ms)
pub const FALL_VIBRATION_PATTERN: [u64; 4] = [0, 1000, 500, 1000];

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
