// # presence-core
//
// Core library for edge-triggered device presence monitoring.
//
// ## Architecture Overview
//
// This library decides, once per run, whether each monitored device is
// present on the network and reports every change of that classification
// exactly once:
// - **ActivitySource**: Trait for reading the last time a device was observed
// - **PresenceStore**: Trait for the per-device `{status, notified}` state
// - **Notifier**: Trait for delivering a transition message to an operator
// - **presence::is_active**: Pure recency classification
// - **transition::reconcile**: Pure edge-triggered state reconciliation
// - **PresenceEngine**: Runner sequencing acquire → reconcile → persist → notify
// - **ComponentRegistry**: Plugin-based registry for sources, stores and notifiers
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Decision logic is pure and separate from I/O
// 2. **Configuration is not state**: Settings are immutable, state lives in a store
// 3. **Plugin-Based**: Components are created from configuration via factories
// 4. **Library-First**: The daemon is a thin wrapper over this crate
// 5. **Exactly-once**: Each genuine transition produces exactly one notification

pub mod traits;
pub mod presence;
pub mod transition;
pub mod engine;
pub mod registry;
pub mod config;
pub mod error;
pub mod state;
pub mod notify;

// Re-export core types for convenience
pub use traits::{ActivitySource, Notifier, PresenceStore};
pub use engine::{PresenceEngine, RunReport};
pub use registry::ComponentRegistry;
pub use config::{ActivitySourceConfig, DeviceConfig, NotifierConfig, PresenceConfig};
pub use error::{Error, Result};
pub use state::{FileStateStore, MemoryStateStore};
pub use notify::LogNotifier;
pub use transition::{DeviceState, PresenceStatus, TransitionEvent};
