//! Events emitted by the classifier

use serde::{Deserialize, Serialize};

/// Why a free-fall was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetCause {
    /// No impact within freeFallResetMs
    Timeout,
    /// Impact spike came too early or too late to be a fall
    ImpactOutsideWindow,
    /// Monitoring was paused mid free-fall
    Paused,
}

/// At most one of these per classified sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallEvent {
    /// Magnitude dropped below the impact threshold
    FreeFallStarted { at_ms: u64 },
    /// Free-fall ended without a fall
    FreeFallReset { at_ms: u64, cause: ResetCause },
    /// Impact inside the free-fall window
    FallConfirmed { at_ms: u64, free_fall_ms: u64, peak: f64 },
}

impl FallEvent {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::FreeFallStarted { .. } => "FREE_FALL_STARTED",
            Self::FreeFallReset { cause: ResetCause::Timeout, .. } => "FREE_FALL_RESET_TIMEOUT",
            Self::FreeFallReset { cause: ResetCause::ImpactOutsideWindow, .. } => "FREE_FALL_RESET_NOISE",
            Self::FreeFallReset { cause: ResetCause::Paused, .. } => "FREE_FALL_RESET_PAUSED",
            Self::FallConfirmed { .. } => "FALL_CONFIRMED",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::FreeFallStarted { .. } => "Free-fall started",
            Self::FreeFallReset { cause: ResetCause::Timeout, .. } => "No impact in time, back to idle",
            Self::FreeFallReset { cause: ResetCause::ImpactOutsideWindow, .. } => "Spike outside free-fall window, ignored",
            Self::FreeFallReset { cause: ResetCause::Paused, .. } => "Monitoring paused",
            Self::FallConfirmed { .. } => "Fall confirmed",
        }
    }

    /// Sample time at which the event happened
    pub fn at_ms(&self) -> u64 {
        match self {
            Self::FreeFallStarted { at_ms }
            | Self::FreeFallReset { at_ms, .. }
            | Self::FallConfirmed { at_ms, .. } => *at_ms,
        }
    }

    pub fn is_fall(&self) -> bool {
        matches!(self, Self::FallConfirmed { .. })
    }
}

impl std::fmt::Display for FallEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
