//! Fall monitor: wires detector, countdown, dispatcher, caches and narrator
//!
//! The detector and the pending countdown live under one mutex that is held
//! for a single transition step and never across an `.await`. Dispatch runs
//! on the countdown's resolver task, so sample classification keeps its own
//! thread of control (and simply stays dormant while an alert is pending).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::core::config::ConfigStore;
use crate::core::contacts::ContactStore;
use crate::core::countdown::Countdown;
use crate::core::detector::{DetectorStats, FallDetector};
use crate::core::dispatcher::AlertDispatcher;
use crate::core::location::LocationCache;
use crate::core::narrator::Narrator;
use crate::core::transport::Transport;
use crate::core::voice;
use crate::error::MonitorError;
use crate::types::{AlertKind, AlertReport, FallState, Location, Notice, Sample, StateOutput};

/// Countdown belonging to alert cycle `cycle`
#[derive(Debug)]
struct PendingAlert {
    cycle: u64,
    countdown: Countdown,
}

#[derive(Debug, Default)]
struct CycleState {
    detector: FallDetector,
    pending: Option<PendingAlert>,
    /// Sample-clock time of the last classified sample and when it arrived
    last_seen: Option<(u64, Instant)>,
}

struct Shared {
    cycle: Mutex<CycleState>,
    config: Arc<ConfigStore>,
    location: Arc<LocationCache>,
    contacts: Arc<dyn ContactStore>,
    dispatcher: AlertDispatcher,
    narrator: Arc<dyn Narrator>,
    enabled: AtomicBool,
    state_tx: watch::Sender<FallState>,
    report_tx: watch::Sender<Option<AlertReport>>,
}

/// Handle to a running fall monitor. Cheap to clone.
#[derive(Clone)]
pub struct FallMonitor {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for FallMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallMonitor")
            .field("state", &self.state())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl FallMonitor {
    /// Create monitor. Starts enabled, in IDLE, with no cached location.
    pub fn new(
        config: Arc<ConfigStore>,
        contacts: Arc<dyn ContactStore>,
        transport: Arc<dyn Transport>,
        narrator: Arc<dyn Narrator>,
    ) -> Self {
        let (state_tx, _) = watch::channel(FallState::Idle);
        let (report_tx, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                cycle: Mutex::new(CycleState::default()),
                config,
                location: Arc::new(LocationCache::new()),
                contacts,
                dispatcher: AlertDispatcher::new(transport),
                narrator,
                enabled: AtomicBool::new(true),
                state_tx,
                report_tx,
            }),
        }
    }

    // =========================================================================
    // Sample path
    // =========================================================================

    /// Classify one sample. Must run inside a tokio runtime (a confirmed fall
    /// arms the countdown timer).
    pub fn submit(&self, sample: Sample) -> Result<StateOutput, MonitorError> {
        if !self.is_enabled() {
            return Err(MonitorError::Paused);
        }
        let config = self.shared.config.get();

        let mut cycle = self.shared.lock_cycle();
        let output = cycle.detector.process(sample, &config)?;
        cycle.last_seen = Some((output.t_ms, Instant::now()));
        if output.fall_confirmed() {
            Shared::arm_countdown(&self.shared, &mut cycle, config.countdown_ms);
        }
        self.shared.publish_state(cycle.detector.state());
        Ok(output)
    }

    /// Consume samples in arrival order until the sender closes. If the
    /// stream stalls, the free-fall timeout is applied on the extrapolated
    /// sample clock.
    pub async fn run_intake<F>(&self, mut rx: mpsc::Receiver<Sample>, mut on_output: F)
    where
        F: FnMut(&StateOutput),
    {
        loop {
            let deadline = self.shared.stall_deadline();
            tokio::select! {
                received = rx.recv() => match received {
                    Some(sample) => match self.submit(sample) {
                        Ok(output) => on_output(&output),
                        Err(err) => debug!(%err, "sample not classified"),
                    },
                    None => break,
                },
                _ = stalled(deadline) => self.shared.expire_if_stalled(),
            }
        }
        debug!("sensor stream closed");
    }

    /// Expire free-falls whose samples stopped arriving. For push-style
    /// intake (HTTP) where no intake loop owns the stream. Never returns
    /// while the monitor's state channel is open.
    pub async fn watch_stalls(&self) {
        let mut states = self.watch_state();
        loop {
            match self.shared.stall_deadline() {
                Some(deadline) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => self.shared.expire_if_stalled(),
                        // Free-fall ended some other way
                        changed = states.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
                None => {
                    if states.changed().await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    /// Run `watch_stalls` on its own task
    pub fn spawn_stall_watch(&self) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move { monitor.watch_stalls().await })
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancel the pending countdown. True only if this call prevented dispatch.
    pub fn cancel(&self) -> bool {
        let mut cycle = self.shared.lock_cycle();
        let Some(pending) = cycle.pending.as_ref() else {
            return false;
        };
        if !pending.countdown.cancel() {
            return false;
        }
        let id = pending.cycle;
        cycle.detector.mark_cancelled(id);
        self.shared.publish_state(cycle.detector.state());
        info!(cycle = id, "countdown cancelled by user");
        true
    }

    /// Map an utterance to `cancel()`
    pub fn cancel_by_voice(&self, utterance: &str) -> bool {
        voice::is_cancel_phrase(utterance) && self.cancel()
    }

    // =========================================================================
    // Manual / test alerts
    // =========================================================================

    /// Send an alert now, no countdown. Occupies the alert cycle until the
    /// dispatch finishes and cannot be cancelled.
    pub fn trigger_manual(&self) -> Result<JoinHandle<AlertReport>, MonitorError> {
        let id = {
            let mut cycle = self.shared.lock_cycle();
            let id = cycle.detector.begin_manual()?;
            self.shared.publish_state(cycle.detector.state());
            id
        };
        self.shared.narrator.narrate(&Notice::ManualAlert);

        let shared = Arc::clone(&self.shared);
        Ok(tokio::spawn(async move {
            let report = shared.dispatch(AlertKind::Manual).await;
            shared.finish_cycle(id);
            report
        }))
    }

    /// Send the test message to every contact. Leaves FallState alone.
    pub async fn send_test_alert(&self) -> AlertReport {
        let contacts = self.shared.contacts.snapshot();
        let location = self.shared.location.snapshot();
        self.shared
            .dispatcher
            .dispatch(AlertKind::Test, &contacts, location.as_deref())
            .await
    }

    // =========================================================================
    // Monitoring toggle
    // =========================================================================

    /// Stop classifying. An in-progress free-fall is dropped; a running
    /// countdown still resolves.
    pub fn pause(&self) {
        if !self.shared.enabled.swap(false, Ordering::AcqRel) {
            return;
        }
        {
            let mut cycle = self.shared.lock_cycle();
            cycle.detector.abandon_free_fall();
            self.shared.publish_state(cycle.detector.state());
        }
        self.shared.narrator.narrate(&Notice::MonitoringStopped);
    }

    pub fn resume(&self) {
        if !self.shared.enabled.swap(true, Ordering::AcqRel) {
            self.shared.narrator.narrate(&Notice::MonitoringStarted);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current state
    pub fn state(&self) -> FallState {
        *self.shared.state_tx.borrow()
    }

    /// Subscribe to state changes
    pub fn watch_state(&self) -> watch::Receiver<FallState> {
        self.shared.state_tx.subscribe()
    }

    /// Subscribe to alert reports
    pub fn watch_reports(&self) -> watch::Receiver<Option<AlertReport>> {
        self.shared.report_tx.subscribe()
    }

    /// Outcomes of the most recent alert cycle
    pub fn last_report(&self) -> Option<AlertReport> {
        self.shared.report_tx.borrow().clone()
    }

    pub fn stats(&self) -> DetectorStats {
        self.shared.lock_cycle().detector.stats()
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.shared.config
    }

    pub fn location(&self) -> &Arc<LocationCache> {
        &self.shared.location
    }

    /// Push interface for the location provider
    pub fn update_location(&self, location: Location) -> bool {
        self.shared.location.update(location)
    }
}

/// Resolves at `deadline`, or never
async fn stalled(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Shared {
    fn lock_cycle(&self) -> MutexGuard<'_, CycleState> {
        self.cycle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wall-clock instant at which a free-fall with no further samples
    /// exceeds `free_fall_reset_ms` on the extrapolated sample clock
    fn stall_deadline(&self) -> Option<Instant> {
        let reset_ms = self.config.get().free_fall_reset_ms;
        let cycle = self.lock_cycle();
        let FallState::InFreeFall { since_ms } = cycle.detector.state() else {
            return None;
        };
        let (t_ms, at) = cycle.last_seen?;
        let due_ms = (since_ms + reset_ms + 1).saturating_sub(t_ms);
        Some(at + Duration::from_millis(due_ms))
    }

    fn expire_if_stalled(&self) {
        let config = self.config.get();
        let mut cycle = self.lock_cycle();
        let Some((t_ms, at)) = cycle.last_seen else {
            return;
        };
        let now_ms = t_ms + at.elapsed().as_millis() as u64;
        if cycle.detector.expire_stale(now_ms, &config).is_some() {
            self.publish_state(cycle.detector.state());
        }
    }

    fn publish_state(&self, state: FallState) {
        self.state_tx.send_if_modified(|current| {
            if *current != state {
                *current = state;
                true
            } else {
                false
            }
        });
    }

    /// Start the countdown for the cycle the detector just opened
    fn arm_countdown(this: &Arc<Self>, cycle: &mut CycleState, countdown_ms: u64) {
        let id = cycle.detector.cycle();

        let on_expire = {
            let shared = Arc::clone(this);
            move || async move {
                shared.dispatch(AlertKind::Fall).await;
                shared.finish_cycle(id);
            }
        };
        let on_cancelled = {
            let shared = Arc::clone(this);
            move || {
                shared.narrator.narrate(&Notice::AlertCancelled);
                shared.finish_cycle(id);
            }
        };

        let countdown = Countdown::begin(Duration::from_millis(countdown_ms), on_expire, on_cancelled);
        cycle.pending = Some(PendingAlert { cycle: id, countdown });
        this.narrator.narrate(&Notice::FallDetected { countdown_ms });
    }

    /// Snapshot contacts and location, send, record the report
    async fn dispatch(&self, kind: AlertKind) -> AlertReport {
        let contacts = self.contacts.snapshot();
        let location = self.location.snapshot();

        let report = self.dispatcher.dispatch(kind, &contacts, location.as_deref()).await;

        if report.is_empty() {
            self.narrator.narrate(&Notice::NoContacts);
        } else {
            self.narrator.narrate(&Notice::AlertSent {
                delivered: report.delivered_count(),
                attempted: report.outcomes.len(),
            });
        }
        info!(
            kind = ?kind,
            delivered = report.delivered_count(),
            failed = report.failed_count(),
            "alert cycle dispatched"
        );
        self.report_tx.send_replace(Some(report.clone()));
        report
    }

    /// Close cycle `id` and re-arm detection
    fn finish_cycle(&self, id: u64) {
        let mut cycle = self.lock_cycle();
        if cycle.detector.resolve(id) {
            if cycle.pending.as_ref().map(|p| p.cycle) == Some(id) {
                cycle.pending = None;
            }
            self.publish_state(cycle.detector.state());
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryError;
    use crate::types::{Contact, ContactList};
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, phone: &str, message: &str) -> Result<(), DeliveryError> {
            self.sent.lock().unwrap().push((phone.to_string(), message.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNarrator {
        notices: Mutex<Vec<Notice>>,
    }

    impl Narrator for RecordingNarrator {
        fn narrate(&self, notice: &Notice) {
            self.notices.lock().unwrap().push(notice.clone());
        }
    }

    struct Rig {
        monitor: FallMonitor,
        transport: Arc<RecordingTransport>,
        narrator: Arc<RecordingNarrator>,
    }

    fn rig_with(contacts: ContactList) -> Rig {
        let transport = Arc::new(RecordingTransport::default());
        let narrator = Arc::new(RecordingNarrator::default());
        let monitor = FallMonitor::new(
            Arc::new(ConfigStore::default()),
            Arc::new(contacts),
            transport.clone(),
            narrator.clone(),
        );
        Rig { monitor, transport, narrator }
    }

    fn rig() -> Rig {
        rig_with(ContactList::from_contacts(vec![
            Contact::new("Ana", "+15550001"),
            Contact::new("Bo", "+15550002"),
        ]))
    }

    fn fall(monitor: &FallMonitor) {
        for (t, m) in [(0, 9.8), (50, 1.0), (350, 20.0)] {
            monitor.submit(Sample::new(t, m)).unwrap();
        }
    }

    async fn wait_idle(monitor: &FallMonitor) {
        let mut rx = monitor.watch_state();
        rx.wait_for(|s| *s == FallState::Idle).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_within_countdown_sends_nothing() {
        let rig = rig();
        fall(&rig.monitor);
        assert_eq!(rig.monitor.state(), FallState::AlertCountdown { fired_at_ms: 350, cancelled: false });

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(rig.monitor.cancel());
        wait_idle(&rig.monitor).await;

        tokio::time::sleep(Duration::from_millis(15_000)).await;
        assert!(rig.transport.sent.lock().unwrap().is_empty());
        assert!(rig.monitor.last_report().is_none());
        let notices = rig.narrator.notices.lock().unwrap();
        assert_eq!(
            *notices,
            vec![Notice::FallDetected { countdown_ms: 10_000 }, Notice::AlertCancelled]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_dispatches_to_every_contact() {
        let rig = rig();
        let mut reports = rig.monitor.watch_reports();
        fall(&rig.monitor);

        reports.changed().await.unwrap();
        let report = rig.monitor.last_report().unwrap();
        assert_eq!(report.kind, AlertKind::Fall);
        assert_eq!(report.delivered_count(), 2);
        assert!(report.message.ends_with("Location unavailable"));

        wait_idle(&rig.monitor).await;
        assert!(!rig.monitor.cancel(), "nothing left to cancel");
        assert!(rig
            .narrator
            .notices
            .lock()
            .unwrap()
            .contains(&Notice::AlertSent { delivered: 2, attempted: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_location_snapshot_goes_into_message() {
        let rig = rig();
        assert!(rig.monitor.update_location(Location::new(52.37, 4.89)));
        let mut reports = rig.monitor.watch_reports();
        fall(&rig.monitor);

        reports.changed().await.unwrap();
        let sent = rig.transport.sent.lock().unwrap();
        assert!(sent[0].1.contains("https://maps.google.com/?q=52.37,4.89"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_fall_during_countdown_is_ignored() {
        let rig = rig();
        fall(&rig.monitor);
        for (t, m) in [(400, 1.0), (700, 25.0)] {
            let out = rig.monitor.submit(Sample::new(t, m)).unwrap();
            assert!(!out.fall_confirmed());
        }
        assert_eq!(rig.monitor.stats().alert_cycles, 1);

        wait_idle(&rig.monitor).await;
        assert_eq!(rig.transport.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_rearms_after_cancel() {
        let rig = rig();
        fall(&rig.monitor);
        assert!(rig.monitor.cancel());
        wait_idle(&rig.monitor).await;

        rig.monitor.submit(Sample::new(1_000, 1.0)).unwrap();
        let out = rig.monitor.submit(Sample::new(1_300, 22.0)).unwrap();
        assert!(out.fall_confirmed());
        assert_eq!(rig.monitor.stats().alert_cycles, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_contacts_announced() {
        let rig = rig_with(ContactList::new());
        fall(&rig.monitor);
        wait_idle(&rig.monitor).await;

        let notices = rig.narrator.notices.lock().unwrap();
        assert_eq!(notices.last(), Some(&Notice::NoContacts));
        assert!(rig.monitor.last_report().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_alert_occupies_cycle() {
        let rig = rig();
        let handle = rig.monitor.trigger_manual().unwrap();
        assert!(rig.monitor.state().is_alerting());
        assert_eq!(rig.monitor.trigger_manual().unwrap_err(), MonitorError::CycleActive);
        assert!(!rig.monitor.cancel(), "manual alerts are not cancellable");

        let report = handle.await.unwrap();
        assert_eq!(report.kind, AlertKind::Manual);
        assert_eq!(rig.monitor.state(), FallState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_rejected_during_countdown() {
        let rig = rig();
        fall(&rig.monitor);
        assert_eq!(rig.monitor.trigger_manual().unwrap_err(), MonitorError::CycleActive);
    }

    #[tokio::test]
    async fn test_test_alert_leaves_state_alone() {
        let rig = rig();
        let report = rig.monitor.send_test_alert().await;
        assert_eq!(report.kind, AlertKind::Test);
        assert_eq!(report.delivered_count(), 2);
        assert_eq!(rig.monitor.state(), FallState::Idle);
        assert!(rig.monitor.last_report().is_none());
    }

    #[tokio::test]
    async fn test_pause_drops_samples_and_free_fall() {
        let rig = rig();
        rig.monitor.submit(Sample::new(0, 1.0)).unwrap();
        assert!(matches!(rig.monitor.state(), FallState::InFreeFall { .. }));

        rig.monitor.pause();
        assert_eq!(rig.monitor.state(), FallState::Idle);
        assert_eq!(rig.monitor.submit(Sample::new(10, 20.0)).unwrap_err(), MonitorError::Paused);

        rig.monitor.resume();
        assert!(rig.monitor.submit(Sample::new(20, 9.8)).is_ok());
        let notices = rig.narrator.notices.lock().unwrap();
        assert_eq!(*notices, vec![Notice::MonitoringStopped, Notice::MonitoringStarted]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_voice_cancel() {
        let rig = rig();
        fall(&rig.monitor);
        assert!(!rig.monitor.cancel_by_voice("help me"));
        assert!(rig.monitor.cancel_by_voice("I'm okay"));
        wait_idle(&rig.monitor).await;
        assert!(rig.transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_deadline_counts_from_free_fall_start() {
        let rig = rig();
        let (tx, rx) = mpsc::channel(8);
        let monitor = rig.monitor.clone();
        let intake = tokio::spawn(async move { monitor.run_intake(rx, |_| {}).await });

        // Free-fall opens at t=0, last sample at t=600
        for t in [0, 200, 400, 600] {
            tx.send(Sample::new(t, 1.0)).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(rig.monitor.state(), FallState::InFreeFall { since_ms: 0 });

        // 1001 - 600 = 401ms after the last sample
        tokio::time::sleep(Duration::from_millis(380)).await;
        assert!(matches!(rig.monitor.state(), FallState::InFreeFall { .. }));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(rig.monitor.state(), FallState::Idle);

        drop(tx);
        intake.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_watch_expires_pushed_free_fall() {
        let rig = rig();
        let watcher = rig.monitor.spawn_stall_watch();

        rig.monitor.submit(Sample::new(0, 1.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(matches!(rig.monitor.state(), FallState::InFreeFall { .. }));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(rig.monitor.state(), FallState::Idle);

        // Re-arms for the next free-fall
        rig.monitor.submit(Sample::new(5_000, 0.5)).unwrap();
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(rig.monitor.state(), FallState::Idle);
        watcher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_intake_expires_stalled_free_fall() {
        let rig = rig();
        let (tx, rx) = mpsc::channel(8);
        let monitor = rig.monitor.clone();
        let intake = tokio::spawn(async move { monitor.run_intake(rx, |_| {}).await });

        tx.send(Sample::new(0, 1.0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(matches!(rig.monitor.state(), FallState::InFreeFall { .. }));

        // Sensor goes quiet: still inside the 1000ms reset window
        tokio::time::sleep(Duration::from_millis(980)).await;
        assert!(matches!(rig.monitor.state(), FallState::InFreeFall { .. }));

        // Just past it
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(rig.monitor.state(), FallState::Idle);

        drop(tx);
        intake.await.unwrap();
    }
}
