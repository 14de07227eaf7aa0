//! Fall State Machine: owns the FallState and applies the classifier per sample
//!
//! Single-writer: callers serialise access (the monitor keeps it behind a mutex
//! held only for one transition step). Once a fall is confirmed the state stays
//! in ALERT_COUNTDOWN until `resolve` is called for that cycle, so at most one
//! alert cycle is ever outstanding.

use tracing::{debug, info};

use crate::core::buffer::SignalBuffer;
use crate::core::classifier::{self, Transition};
use crate::error::{MonitorError, SampleError};
use crate::types::{DetectionConfig, FallEvent, FallState, ResetCause, Sample, StateOutput};

/// Counters exposed for status displays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DetectorStats {
    pub samples_accepted: u64,
    pub samples_dropped: u64,
    pub falls_confirmed: u64,
    pub alert_cycles: u64,
}

/// Fall state machine
#[derive(Debug)]
pub struct FallDetector {
    /// Current state
    state: FallState,
    /// Recent accepted samples
    buffer: SignalBuffer,
    /// Id of the current (or last) alert cycle
    cycle: u64,
    stats: DetectorStats,
}

impl Default for FallDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FallDetector {
    /// Create new detector in IDLE
    pub fn new() -> Self {
        Self {
            state: FallState::Idle,
            buffer: SignalBuffer::new(),
            cycle: 0,
            stats: DetectorStats::default(),
        }
    }

    /// Classify one sample against the config current at this moment.
    /// Anomalous samples are refused and leave the state untouched.
    pub fn process(&mut self, sample: Sample, config: &DetectionConfig) -> Result<StateOutput, SampleError> {
        if let Err(err) = self.buffer.push(sample) {
            self.stats.samples_dropped += 1;
            debug!(%err, "sample dropped");
            return Err(err);
        }
        self.stats.samples_accepted += 1;

        let transition = classifier::classify(self.state, &sample, config, sample.timestamp_ms);
        self.apply(transition);

        Ok(StateOutput::new(&sample, self.state, transition.event))
    }

    /// Apply the reset timeout at `now_ms` without a sample
    pub fn expire_stale(&mut self, now_ms: u64, config: &DetectionConfig) -> Option<FallEvent> {
        let transition = classifier::expire(self.state, config, now_ms);
        self.apply(transition);
        transition.event
    }

    fn apply(&mut self, transition: Transition) {
        if let Some(event) = transition.event {
            match event {
                FallEvent::FallConfirmed { at_ms, free_fall_ms, peak } => {
                    self.stats.falls_confirmed += 1;
                    self.cycle += 1;
                    self.stats.alert_cycles += 1;
                    info!(at_ms, free_fall_ms, peak, cycle = self.cycle, "fall confirmed");
                }
                other => debug!(event = other.code(), at_ms = other.at_ms(), "{}", other.description()),
            }
        }
        self.state = transition.next;
    }

    /// Open an alert cycle without a detected fall (manual emergency)
    pub fn begin_manual(&mut self) -> Result<u64, MonitorError> {
        if self.state.is_alerting() {
            return Err(MonitorError::CycleActive);
        }
        self.cycle += 1;
        self.stats.alert_cycles += 1;
        self.state = FallState::AlertCountdown {
            fired_at_ms: self.buffer.last_timestamp_ms().unwrap_or(0),
            cancelled: false,
        };
        info!(cycle = self.cycle, "manual alert cycle opened");
        Ok(self.cycle)
    }

    /// Flag the current cycle as cancelled, if `cycle` is still the one pending
    pub fn mark_cancelled(&mut self, cycle: u64) -> bool {
        match &mut self.state {
            FallState::AlertCountdown { cancelled, .. } if cycle == self.cycle => {
                *cancelled = true;
                true
            }
            _ => false,
        }
    }

    /// Close alert cycle `cycle` and return to IDLE. Stale ids are ignored.
    pub fn resolve(&mut self, cycle: u64) -> bool {
        if self.state.is_alerting() && cycle == self.cycle {
            debug!(cycle, "alert cycle resolved");
            self.state = FallState::Idle;
            true
        } else {
            false
        }
    }

    /// Abandon an in-progress free-fall (monitoring paused)
    pub fn abandon_free_fall(&mut self) -> Option<FallEvent> {
        match self.state {
            FallState::InFreeFall { .. } => {
                let at_ms = self.buffer.last_timestamp_ms().unwrap_or(0);
                let event = FallEvent::FreeFallReset { at_ms, cause: ResetCause::Paused };
                self.apply(Transition { next: FallState::Idle, event: Some(event) });
                Some(event)
            }
            _ => None,
        }
    }

    /// Get current state
    pub fn state(&self) -> FallState {
        self.state
    }

    /// Id of the current (or most recent) alert cycle
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn stats(&self) -> DetectorStats {
        self.stats
    }
}

// =============================================================================
// TESTS
// =============================================================================
