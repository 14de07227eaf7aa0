//! Fall state definitions

use serde::{Deserialize, Serialize};

/// The three possible states of the fall state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallState {
    /// Watching for a drop in acceleration
    #[default]
    Idle,
    /// Magnitude fell below the impact threshold at `since_ms`
    InFreeFall { since_ms: u64 },
    /// Fall confirmed at `fired_at_ms`, alert pending
    AlertCountdown { fired_at_ms: u64, cancelled: bool },
}

impl FallState {
    /// Short name, matches the serde tag
    pub fn name(&self) -> &'static str {
        match self {
            FallState::Idle => "IDLE",
            FallState::InFreeFall { .. } => "IN_FREE_FALL",
            FallState::AlertCountdown { .. } => "ALERT_COUNTDOWN",
        }
    }

    /// Is an alert cycle outstanding?
    pub fn is_alerting(&self) -> bool {
        matches!(self, FallState::AlertCountdown { .. })
    }

    /// Get ANSI color code for terminal display
    pub fn color_code(&self) -> &'static str {
        match self {
            FallState::Idle => "\x1b[90m",                // Gray
            FallState::InFreeFall { .. } => "\x1b[33m",   // Yellow
            FallState::AlertCountdown { cancelled: true, .. } => "\x1b[36m", // Cyan
            FallState::AlertCountdown { .. } => "\x1b[31m", // Red
        }
    }

    /// Reset ANSI color
    pub fn color_reset() -> &'static str {
        "\x1b[0m"
    }

    /// Get emoji for state
    pub fn emoji(&self) -> &'static str {
        match self {
            FallState::Idle => "🟢",
            FallState::InFreeFall { .. } => "🟡",
            FallState::AlertCountdown { .. } => "🚨",
        }
    }
}

impl std::fmt::Display for FallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallState::Idle => write!(f, "IDLE"),
            FallState::InFreeFall { since_ms } => write!(f, "IN_FREE_FALL(since={}ms)", since_ms),
            FallState::AlertCountdown { fired_at_ms, cancelled } => {
                write!(f, "ALERT_COUNTDOWN(fired={}ms", fired_at_ms)?;
                if *cancelled {
                    write!(f, ", cancelled")?;
                }
                write!(f, ")")
            }
        }
    }
}
