//! Alert Dispatcher: compose the message, send to every present contact,
//! collect one outcome each. One failure never stops the others.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use tracing::{info, warn};

use crate::core::transport::Transport;
use crate::types::{AlertKind, AlertOutcome, AlertReport, ContactList, Location};

/// Clause used when no fix is cached
pub const LOCATION_UNAVAILABLE: &str = "Location unavailable";

/// Build the alert text for `kind` with the location clause always present
pub fn compose_message(kind: AlertKind, location: Option<&Location>) -> String {
    let clause = match location {
        Some(loc) => format!("Location: {}", loc.maps_url()),
        None => LOCATION_UNAVAILABLE.to_string(),
    };
    format!("{} {}", kind.headline(), clause)
}

/// Sends alerts through a transport
#[derive(Clone)]
pub struct AlertDispatcher {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher").finish_non_exhaustive()
    }
}

impl AlertDispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Deliver to every present contact concurrently. Returns once all
    /// outcomes are in, in slot order. No retries here.
    pub async fn dispatch(
        &self,
        kind: AlertKind,
        contacts: &ContactList,
        location: Option<&Location>,
    ) -> AlertReport {
        let message = compose_message(kind, location);

        let sends = contacts.present().map(|contact| {
            let message = message.as_str();
            async move {
                match self.transport.send(&contact.phone_number, message).await {
                    Ok(()) => {
                        info!(contact = contact.label(), "alert delivered");
                        AlertOutcome::delivered(contact.clone())
                    }
                    Err(err) => {
                        warn!(contact = contact.label(), %err, "alert delivery failed");
                        AlertOutcome::failed(contact.clone(), err.to_string())
                    }
                }
            }
        });
        let outcomes = join_all(sends).await;

        AlertReport {
            kind,
            message,
            location: location.cloned(),
            outcomes,
            dispatched_at: Utc::now(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
