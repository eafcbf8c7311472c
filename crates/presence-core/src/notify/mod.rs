// # Built-in Notifiers
//
// Channel implementations that need no external crates live here; mail
// delivery is provided by the `presence-notify-smtp` crate.

pub mod log;

pub use log::{LogNotifier, LogNotifierFactory};
