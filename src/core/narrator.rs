//! User feedback channel. Fire-and-forget: nothing the narrator does
//! (or fails to do) reaches back into detection.

use tokio::sync::broadcast;
use tracing::info;

use crate::types::Notice;

/// Speaks / shows / vibrates a notice
pub trait Narrator: Send + Sync {
    fn narrate(&self, notice: &Notice);
}

/// Logs each notice and fans it out to live subscribers (terminal, WebSocket)
#[derive(Debug, Clone)]
pub struct BroadcastNarrator {
    tx: broadcast::Sender<Notice>,
}

impl Default for BroadcastNarrator {
    fn default() -> Self {
        Self::new(64)
    }
}

impl BroadcastNarrator {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

impl Narrator for BroadcastNarrator {
    fn narrate(&self, notice: &Notice) {
        match notice.vibration() {
            Some(pattern) => info!(?pattern, "🔊 {}", notice),
            None => info!("🔊 {}", notice),
        }
        // No subscribers is fine
        let _ = self.tx.send(notice.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_notices() {
        let narrator = BroadcastNarrator::default();
        let mut rx = narrator.subscribe();
        narrator.narrate(&Notice::AlertCancelled);
        assert_eq!(rx.recv().await.unwrap(), Notice::AlertCancelled);
    }

    #[test]
    fn test_narrate_without_subscribers_does_not_fail() {
        BroadcastNarrator::new(1).narrate(&Notice::MonitoringStarted);
    }
}
