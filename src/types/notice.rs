//! User-facing notices (spoken / shown / vibrated)

use serde::{Deserialize, Serialize};

use crate::FALL_VIBRATION_PATTERN;

/// Something the user should hear about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "notice", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notice {
    /// Countdown started
    FallDetected { countdown_ms: u64 },
    /// User cancelled the countdown
    AlertCancelled,
    /// Dispatch finished
    AlertSent { delivered: usize, attempted: usize },
    /// Dispatch found nobody to send to
    NoContacts,
    /// Manual emergency requested
    ManualAlert,
    MonitoringStarted,
    MonitoringStopped,
}

impl Notice {
    /// Text to speak
    pub fn text(&self) -> String {
        match self {
            Notice::FallDetected { countdown_ms } => format!(
                "Fall detected! Sending emergency alert in {} seconds. Say 'Cancel' to stop.",
                countdown_ms.div_ceil(1000)
            ),
            Notice::AlertCancelled => "Emergency alert cancelled.".to_string(),
            Notice::AlertSent { delivered, attempted } if delivered == attempted => {
                "Emergency alert sent to your contacts.".to_string()
            }
            Notice::AlertSent { delivered: 0, .. } => {
                "Emergency alert could not be delivered.".to_string()
            }
            Notice::AlertSent { delivered, attempted } => format!(
                "Emergency alert sent to {} of {} contacts.",
                delivered, attempted
            ),
            Notice::NoContacts => "No emergency contacts configured.".to_string(),
            Notice::ManualAlert => "Emergency alert activated.".to_string(),
            Notice::MonitoringStarted => "Fall detection activated.".to_string(),
            Notice::MonitoringStopped => "Fall detection deactivated.".to_string(),
        }
    }

    /// Vibration pattern to play alongside, in milliseconds
    pub fn vibration(&self) -> Option<&'static [u64]> {
        match self {
            Notice::FallDetected { .. } | Notice::ManualAlert => Some(&FALL_VIBRATION_PATTERN),
            _ => None,
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text())
    }
}
