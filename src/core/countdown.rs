//! Countdown/Cancellation Controller
//!
//! `begin` arms a timer; `cancel` may arrive from any thread. Both paths
//! funnel into one resolver task, and the outcome is claimed with a single
//! compare-and-set on `phase`, so exactly one of {expire, cancel} ever runs.
//!
//! ```text
//!            cancel() wins CAS               resolver runs on_cancelled
//!  PENDING ───────────────────► CANCELLED ─────────────────────────────►
//!     │
//!     │ timer fires, resolver wins CAS       resolver runs on_expire
//!     └─────────────────────────► EXPIRED ─────────────────────────────►
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

const PENDING: u8 = 0;
const CANCELLED: u8 = 1;
const EXPIRED: u8 = 2;

/// How a countdown ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Expired,
    Cancelled,
}

#[derive(Debug)]
struct Shared {
    phase: AtomicU8,
    wake: Notify,
}

impl Shared {
    fn claim(&self, outcome: u8) -> bool {
        self.phase
            .compare_exchange(PENDING, outcome, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// A running countdown
#[derive(Debug)]
pub struct Countdown {
    shared: Arc<Shared>,
    task: JoinHandle<Resolution>,
}

impl Countdown {
    /// Arm a countdown of `duration`. Must be called inside a tokio runtime.
    ///
    /// `on_expire` runs (and is awaited) only if the timer wins;
    /// `on_cancelled` runs only if `cancel` wins.
    pub fn begin<E, F, C>(duration: Duration, on_expire: E, on_cancelled: C) -> Self
    where
        E: FnOnce() -> F + Send + 'static,
        F: Future<Output = ()> + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let shared = Arc::new(Shared {
            phase: AtomicU8::new(PENDING),
            wake: Notify::new(),
        });

        let resolver = Arc::clone(&shared);
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = resolver.wake.notified() => {}
            }

            // Timer fired or cancel woke us. Try to claim expiry; losing means
            // cancel() got there first.
            if resolver.claim(EXPIRED) {
                debug!("countdown expired");
                on_expire().await;
                Resolution::Expired
            } else {
                debug!("countdown cancelled");
                on_cancelled();
                Resolution::Cancelled
            }
        });

        Self { shared, task }
    }

    /// Request cancellation. True only for the call that actually cancelled;
    /// after expiry (or a previous cancel) this is a no-op returning false.
    pub fn cancel(&self) -> bool {
        if self.shared.claim(CANCELLED) {
            self.shared.wake.notify_one();
            true
        } else {
            false
        }
    }

    /// Still waiting for either outcome?
    pub fn is_pending(&self) -> bool {
        self.shared.phase.load(Ordering::Acquire) == PENDING
    }

    /// Outcome claimed so far, if any
    pub fn resolution(&self) -> Option<Resolution> {
        match self.shared.phase.load(Ordering::Acquire) {
            CANCELLED => Some(Resolution::Cancelled),
            EXPIRED => Some(Resolution::Expired),
            _ => None,
        }
    }

    /// Wait for the resolver (including the expiry callback) to finish
    pub async fn finished(self) -> Option<Resolution> {
        self.task.await.ok()
    }
}

// =============================================================================
// TESTS
// =============================================================================
