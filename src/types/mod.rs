//! Core types for FallSentry

mod sample;
mod state;
mod event;
mod config;
mod location;
mod contact;
mod alert;
mod output;
mod notice;

pub use sample::{AccelReading, Sample};
pub use state::FallState;
pub use event::{FallEvent, ResetCause};
pub use config::{DetectionConfig, ConfigUpdate, Sensitivity};
pub use location::Location;
pub use contact::{Contact, ContactList};
pub use alert::{AlertKind, AlertOutcome, AlertReport};
pub use output::StateOutput;
pub use notice::Notice;
