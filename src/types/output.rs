//! Output structures for terminal display

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use crate::types::{FallEvent, FallState, Sample};

/// Output structure for each classified sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateOutput {
    /// Wall-clock time of classification
    pub timestamp: DateTime<Utc>,
    /// Sample timestamp (milliseconds)
    pub t_ms: u64,
    /// Acceleration magnitude
    pub magnitude: f64,
    /// State after the sample
    pub state: FallState,
    /// Event emitted by this sample, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<FallEvent>,
}

impl StateOutput {
    /// Create new output
    pub fn new(sample: &Sample, state: FallState, event: Option<FallEvent>) -> Self {
        Self {
            timestamp: Utc::now(),
            t_ms: sample.timestamp_ms,
            magnitude: sample.magnitude,
            state,
            event,
        }
    }

    /// Did this sample confirm a fall?
    pub fn fall_confirmed(&self) -> bool {
        self.event.map(|e| e.is_fall()).unwrap_or(false)
    }

    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let color = self.state.color_code();
        let reset = FallState::color_reset();
        let emoji = self.state.emoji();

        format!(
            "{}{} t={}ms | |a|={:6.2} | state={} | {}{}",
            color,
            emoji,
            self.t_ms,
            self.magnitude,
            self.state.name(),
            self.event.map(|e| e.code()).unwrap_or("-"),
            reset
        )
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "t={}ms | magnitude={:.2} | state={} | event={}",
            self.t_ms,
            self.magnitude,
            self.state.name(),
            self.event.map(|e| e.code()).unwrap_or("-")
        )
    }
}
