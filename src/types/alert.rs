//! Alert outcomes and reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Contact, Location};

/// What triggered an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Countdown after a confirmed fall expired
    Fall,
    /// User asked for help directly
    Manual,
    /// Test message, no emergency
    Test,
}

impl AlertKind {
    /// Opening sentence of the message
    pub fn headline(&self) -> &'static str {
        match self {
            AlertKind::Fall => "EMERGENCY: Fall detected! Please check on me immediately.",
            AlertKind::Manual => "EMERGENCY: I need help! Please check on me immediately.",
            AlertKind::Test => "TEST: This is a test of my emergency alert. No action needed.",
        }
    }
}

/// Delivery result for one contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertOutcome {
    pub contact: Contact,
    pub delivered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AlertOutcome {
    pub fn delivered(contact: Contact) -> Self {
        Self { contact, delivered: true, error: None }
    }

    pub fn failed(contact: Contact, reason: impl Into<String>) -> Self {
        Self { contact, delivered: false, error: Some(reason.into()) }
    }
}

/// Everything that happened in one dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertReport {
    pub kind: AlertKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// One per present contact, in slot order
    pub outcomes: Vec<AlertOutcome>,
    pub dispatched_at: DateTime<Utc>,
}

impl AlertReport {
    pub fn delivered_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.delivered).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.delivered_count()
    }

    /// No contacts were configured
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
