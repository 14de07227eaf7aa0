//! Core modules for FallSentry

pub mod buffer;
pub mod classifier;
pub mod detector;
pub mod countdown;
pub mod location;
pub mod config;
pub mod contacts;
pub mod transport;
pub mod dispatcher;
pub mod narrator;
pub mod voice;
pub mod monitor;
pub mod api;

pub use buffer::SignalBuffer;
pub use classifier::{classify, Transition};
pub use detector::{DetectorStats, FallDetector};
pub use countdown::{Countdown, Resolution};
pub use location::LocationCache;
pub use config::ConfigStore;
pub use contacts::{is_valid_phone, ContactBook, ContactStore};
pub use transport::{LogTransport, Transport, WebhookTransport};
pub use dispatcher::{compose_message, AlertDispatcher};
pub use narrator::{BroadcastNarrator, Narrator};
pub use voice::is_cancel_phrase;
pub use monitor::FallMonitor;
pub use api::{create_app, create_router, run_server, AppState};
