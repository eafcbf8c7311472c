//! Core traits for the presence system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ActivitySource`]: Read when a device was last observed
//! - [`PresenceStore`]: Persistent per-device state for exactly-once notifications
//! - [`Notifier`]: Deliver transition messages

pub mod activity_source;
pub mod notifier;
pub mod state_store;

pub use activity_source::{ActivitySource, ActivitySourceFactory, Observation};
pub use notifier::{Notifier, NotifierFactory};
pub use state_store::{PresenceStore, StateStoreFactory};
