//! Transports: how a text alert reaches a phone number
//!
//! Timeouts and retries belong to the transport, never to the dispatcher.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::DeliveryError;

/// Sends one text message to one phone number
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, phone_number: &str, message: &str) -> Result<(), DeliveryError>;
}

/// Logs the message and reports success. Used for simulation and development.
#[derive(Debug, Default, Clone)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn send(&self, phone_number: &str, message: &str) -> Result<(), DeliveryError> {
        info!(to = phone_number, %message, "SMS (log transport)");
        Ok(())
    }
}

/// JSON body posted to the gateway
#[derive(Debug, Serialize)]
struct GatewayMessage<'a> {
    to: &'a str,
    body: &'a str,
}

/// Posts `{"to", "body"}` to an SMS gateway webhook
#[derive(Clone)]
pub struct WebhookTransport {
    url: String,
    agent: ureq::Agent,
    bearer_token: Option<String>,
}

impl std::fmt::Debug for WebhookTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookTransport")
            .field("url", &self.url)
            .field("authenticated", &self.bearer_token.is_some())
            .finish()
    }
}

impl WebhookTransport {
    /// Gateway at `url` with a 30s request timeout
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, Duration::from_secs(30))
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            bearer_token: None,
        }
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn post(&self, phone_number: &str, message: &str) -> Result<(), DeliveryError> {
        let mut request = self.agent.post(&self.url);
        if let Some(token) = &self.bearer_token {
            request = request.set("Authorization", &format!("Bearer {}", token));
        }
        match request.send_json(GatewayMessage { to: phone_number, body: message }) {
            Ok(response) => {
                debug!(status = response.status(), to = phone_number, "gateway accepted");
                Ok(())
            }
            Err(ureq::Error::Status(code, _)) => Err(DeliveryError::Rejected(code)),
            Err(ureq::Error::Transport(t)) => Err(DeliveryError::Transport(t.to_string())),
        }
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    async fn send(&self, phone_number: &str, message: &str) -> Result<(), DeliveryError> {
        // ureq is blocking
        let this = self.clone();
        let to = phone_number.to_string();
        let body = message.to_string();
        tokio::task::spawn_blocking(move || this.post(&to, &body))
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?
    }
}
