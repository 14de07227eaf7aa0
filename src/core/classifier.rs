//! Threshold Classifier: the single transition function of the fall state machine
//!
//! State transitions:
//! - IDLE → IN_FREE_FALL: magnitude < impact threshold
//! - IN_FREE_FALL → ALERT_COUNTDOWN: magnitude > fall threshold AND min ≤ elapsed ≤ max
//! - IN_FREE_FALL → IDLE: spike outside the window (noise), or elapsed > reset (timeout)
//! - ALERT_COUNTDOWN: frozen until the countdown resolves

use crate::types::{DetectionConfig, FallEvent, FallState, ResetCause, Sample};

/// Result of classifying one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub next: FallState,
    pub event: Option<FallEvent>,
}

impl Transition {
    fn stay(state: FallState) -> Self {
        Self { next: state, event: None }
    }

    fn to(next: FallState, event: FallEvent) -> Self {
        Self { next, event: Some(event) }
    }
}

/// Pure transition function. `now_ms` is the sample clock.
pub fn classify(
    state: FallState,
    sample: &Sample,
    config: &DetectionConfig,
    now_ms: u64,
) -> Transition {
    match state {
        FallState::Idle => {
            if sample.magnitude < config.impact_threshold {
                Transition::to(
                    FallState::InFreeFall { since_ms: now_ms },
                    FallEvent::FreeFallStarted { at_ms: now_ms },
                )
            } else {
                Transition::stay(state)
            }
        }

        FallState::InFreeFall { since_ms } => {
            let elapsed = now_ms.saturating_sub(since_ms);

            if sample.magnitude > config.fall_threshold {
                if config.in_free_fall_window(elapsed) {
                    Transition::to(
                        FallState::AlertCountdown { fired_at_ms: now_ms, cancelled: false },
                        FallEvent::FallConfirmed {
                            at_ms: now_ms,
                            free_fall_ms: elapsed,
                            peak: sample.magnitude,
                        },
                    )
                } else {
                    // Too-fast spike or stale free-fall
                    Transition::to(
                        FallState::Idle,
                        FallEvent::FreeFallReset { at_ms: now_ms, cause: ResetCause::ImpactOutsideWindow },
                    )
                }
            } else if elapsed > config.free_fall_reset_ms {
                Transition::to(
                    FallState::Idle,
                    FallEvent::FreeFallReset { at_ms: now_ms, cause: ResetCause::Timeout },
                )
            } else {
                Transition::stay(state)
            }
        }

        FallState::AlertCountdown { .. } => Transition::stay(state),
    }
}

/// Timeout check with no sample in hand (sensor stream stalled)
pub fn expire(state: FallState, config: &DetectionConfig, now_ms: u64) -> Transition {
    match state {
        FallState::InFreeFall { since_ms } if now_ms.saturating_sub(since_ms) > config.free_fall_reset_ms => {
            Transition::to(
                FallState::Idle,
                FallEvent::FreeFallReset { at_ms: now_ms, cause: ResetCause::Timeout },
            )
        }
        _ => Transition::stay(state),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> DetectionConfig {
        DetectionConfig {
            impact_threshold: 2.0,
            fall_threshold: 15.0,
            min_free_fall_ms: 100,
            max_free_fall_ms: 800,
            free_fall_reset_ms: 1000,
            countdown_ms: 10_000,
        }
    }

    fn step(state: FallState, t: u64, mag: f64) -> Transition {
        classify(state, &Sample::new(t, mag), &cfg(), t)
    }

    #[test]
    fn test_idle_stays_idle_at_rest() {
        let tr = step(FallState::Idle, 0, 9.8);
        assert_eq!(tr.next, FallState::Idle);
        assert_eq!(tr.event, None);
    }

    #[test]
    fn test_idle_at_exact_impact_threshold_stays_idle() {
        // strictly below is required
        assert_eq!(step(FallState::Idle, 0, 2.0).next, FallState::Idle);
    }

    #[test]
    fn test_idle_to_free_fall() {
        let tr = step(FallState::Idle, 50, 1.0);
        assert_eq!(tr.next, FallState::InFreeFall { since_ms: 50 });
        assert_eq!(tr.event, Some(FallEvent::FreeFallStarted { at_ms: 50 }));
    }

    #[test]
    fn test_impact_in_window_confirms_fall() {
        let tr = step(FallState::InFreeFall { since_ms: 50 }, 350, 20.0);
        assert_eq!(tr.next, FallState::AlertCountdown { fired_at_ms: 350, cancelled: false });
        assert!(matches!(
            tr.event,
            Some(FallEvent::FallConfirmed { free_fall_ms: 300, .. })
        ));
    }

    #[test]
    fn test_impact_too_fast_is_noise() {
        let tr = step(FallState::InFreeFall { since_ms: 50 }, 100, 20.0);
        assert_eq!(tr.next, FallState::Idle);
        assert!(matches!(
            tr.event,
            Some(FallEvent::FreeFallReset { cause: ResetCause::ImpactOutsideWindow, .. })
        ));
    }

    #[test]
    fn test_impact_too_late_is_noise() {
        let tr = step(FallState::InFreeFall { since_ms: 50 }, 950, 20.0);
        assert_eq!(tr.next, FallState::Idle);
        assert!(!tr.event.unwrap().is_fall());
    }

    #[test]
    fn test_window_edges_confirm() {
        assert!(step(FallState::InFreeFall { since_ms: 0 }, 100, 16.0).next.is_alerting());
        assert!(step(FallState::InFreeFall { since_ms: 0 }, 800, 16.0).next.is_alerting());
    }

    #[test]
    fn test_magnitude_equal_to_fall_threshold_is_not_impact() {
        let tr = step(FallState::InFreeFall { since_ms: 0 }, 300, 15.0);
        assert_eq!(tr.next, FallState::InFreeFall { since_ms: 0 });
    }

    #[test]
    fn test_timeout_without_impact() {
        let tr = step(FallState::InFreeFall { since_ms: 0 }, 1001, 5.0);
        assert_eq!(tr.next, FallState::Idle);
        assert!(matches!(
            tr.event,
            Some(FallEvent::FreeFallReset { cause: ResetCause::Timeout, .. })
        ));
        // At exactly the reset window, still waiting
        let tr = step(FallState::InFreeFall { since_ms: 0 }, 1000, 5.0);
        assert_eq!(tr.next, FallState::InFreeFall { since_ms: 0 });
    }

    #[test]
    fn test_countdown_ignores_samples() {
        let s = FallState::AlertCountdown { fired_at_ms: 350, cancelled: false };
        for (t, mag) in [(400, 0.5), (500, 30.0), (600, 9.8)] {
            let tr = step(s, t, mag);
            assert_eq!(tr.next, s);
            assert_eq!(tr.event, None);
        }
    }

    #[test]
    fn test_expire_only_after_reset_window() {
        let s = FallState::InFreeFall { since_ms: 100 };
        assert_eq!(expire(s, &cfg(), 1100).next, s);
        assert_eq!(expire(s, &cfg(), 1101).next, FallState::Idle);
        assert_eq!(expire(FallState::Idle, &cfg(), 99_999).event, None);
    }
}
