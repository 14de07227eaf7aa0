//! Integration tests for the alert cycle
//!
//! Tests the full path: samples → FallMonitor → Countdown → AlertDispatcher → Transport

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fallsentry::core::{BroadcastNarrator, ConfigStore, ContactBook, FallMonitor, Transport};
use fallsentry::error::DeliveryError;
use fallsentry::types::{AlertKind, Contact, ConfigUpdate, FallState, Location, Notice, Sample};
use tokio::sync::mpsc;

/// Records every send; numbers in `down` fail
#[derive(Default)]
struct Gateway {
    down: Vec<String>,
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Transport for Gateway {
    async fn send(&self, phone_number: &str, message: &str) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push((phone_number.to_string(), message.to_string()));
        if self.down.iter().any(|n| n == phone_number) {
            Err(DeliveryError::Transport("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

struct Harness {
    monitor: FallMonitor,
    gateway: Arc<Gateway>,
    contacts: Arc<ContactBook>,
    narrator: BroadcastNarrator,
}

fn harness(down: &[&str]) -> Harness {
    let contacts = Arc::new(ContactBook::new());
    contacts.set_slot(1, Contact::new("Ana", "+15550001")).unwrap();
    contacts.set_slot(2, Contact::new("Bo", "+15550002")).unwrap();
    contacts.set_slot(3, Contact::new("Cy", "+15550003")).unwrap();

    let gateway = Arc::new(Gateway {
        down: down.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    });
    let narrator = BroadcastNarrator::default();
    let monitor = FallMonitor::new(
        Arc::new(ConfigStore::default()),
        contacts.clone(),
        gateway.clone(),
        Arc::new(narrator.clone()),
    );
    Harness { monitor, gateway, contacts, narrator }
}

fn fall_at(monitor: &FallMonitor, t0: u64) {
    for (dt, m) in [(0, 9.8), (50, 1.0), (350, 20.0)] {
        monitor.submit(Sample::new(t0 + dt, m)).unwrap();
    }
}

async fn until_idle(monitor: &FallMonitor) {
    monitor
        .watch_state()
        .wait_for(|s| *s == FallState::Idle)
        .await
        .map(|_| ())
        .unwrap();
}

/// Fall at t=350, cancel 400ms into the countdown: nothing is sent, ever
#[tokio::test(start_paused = true)]
async fn test_cancelled_fall_sends_nothing() {
    let h = harness(&[]);
    fall_at(&h.monitor, 0);
    assert!(h.monitor.state().is_alerting());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(h.monitor.cancel());
    until_idle(&h.monitor).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(h.gateway.sent.lock().unwrap().is_empty());
    assert!(h.monitor.last_report().is_none());
}

/// Uncancelled fall reaches every contact; one dead number does not stop the rest
#[tokio::test(start_paused = true)]
async fn test_expired_fall_reaches_all_contacts() {
    let h = harness(&["+15550002"]);
    h.monitor.update_location(Location::new(40.4168, -3.7038));
    let mut reports = h.monitor.watch_reports();

    fall_at(&h.monitor, 0);
    reports.changed().await.unwrap();

    let report = h.monitor.last_report().unwrap();
    assert_eq!(report.kind, AlertKind::Fall);
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.delivered_count(), 2);
    assert_eq!(report.outcomes[1].contact.name, "Bo");
    assert!(!report.outcomes[1].delivered);
    assert!(report.message.contains("https://maps.google.com/?q=40.4168,-3.7038"));

    until_idle(&h.monitor).await;
    assert_eq!(h.gateway.sent.lock().unwrap().len(), 3);
}

/// Countdown length follows the live config
#[tokio::test(start_paused = true)]
async fn test_countdown_uses_configured_duration() {
    let h = harness(&[]);
    h.monitor
        .config()
        .set(&ConfigUpdate { countdown_ms: Some(2_000), ..Default::default() })
        .unwrap();

    fall_at(&h.monitor, 0);
    tokio::time::sleep(Duration::from_millis(1_900)).await;
    assert!(h.gateway.sent.lock().unwrap().is_empty());

    until_idle(&h.monitor).await;
    assert_eq!(h.gateway.sent.lock().unwrap().len(), 3);
}

/// Cancelling after the alert went out changes nothing
#[tokio::test(start_paused = true)]
async fn test_cancel_after_dispatch_is_noop() {
    let h = harness(&[]);
    fall_at(&h.monitor, 0);
    until_idle(&h.monitor).await;

    assert!(!h.monitor.cancel());
    assert_eq!(h.gateway.sent.lock().unwrap().len(), 3);
}

/// Contacts are snapshotted at dispatch time, not at fall time
#[tokio::test(start_paused = true)]
async fn test_contact_edits_during_countdown_apply() {
    let h = harness(&[]);
    fall_at(&h.monitor, 0);
    h.contacts.clear_slot(3).unwrap();

    until_idle(&h.monitor).await;
    let report = h.monitor.last_report().unwrap();
    assert_eq!(report.outcomes.len(), 2);
}

/// At most one cycle: repeated falls during a countdown are ignored,
/// detection re-arms afterwards
#[tokio::test(start_paused = true)]
async fn test_one_cycle_at_a_time() {
    let h = harness(&[]);
    fall_at(&h.monitor, 0);
    fall_at(&h.monitor, 1_000);
    assert_eq!(h.monitor.stats().alert_cycles, 1);

    until_idle(&h.monitor).await;
    assert_eq!(h.gateway.sent.lock().unwrap().len(), 3);

    fall_at(&h.monitor, 20_000);
    assert_eq!(h.monitor.stats().alert_cycles, 2);
    assert!(h.monitor.cancel());
}

/// Notices arrive in order for a cancelled cycle
#[tokio::test(start_paused = true)]
async fn test_notice_sequence() {
    let h = harness(&[]);
    let mut notices = h.narrator.subscribe();

    fall_at(&h.monitor, 0);
    assert!(h.monitor.cancel_by_voice("false alarm, I'm fine"));

    assert_eq!(notices.recv().await.unwrap(), Notice::FallDetected { countdown_ms: 10_000 });
    assert_eq!(notices.recv().await.unwrap(), Notice::AlertCancelled);
}

/// Streamed intake: a stalled stream still lets a free-fall expire
#[tokio::test(start_paused = true)]
async fn test_intake_stream() {
    let h = harness(&[]);
    let (tx, rx) = mpsc::channel(16);
    let monitor = h.monitor.clone();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let intake = tokio::spawn(async move {
        monitor
            .run_intake(rx, move |out| sink.lock().unwrap().push(out.state))
            .await
    });

    for (t, m) in [(0, 9.8), (20, 1.2), (40, 1.1)] {
        tx.send(Sample::new(t, m)).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(matches!(h.monitor.state(), FallState::InFreeFall { .. }));

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.monitor.state(), FallState::Idle);

    drop(tx);
    intake.await.unwrap();
    assert_eq!(seen.lock().unwrap().len(), 3);
}
