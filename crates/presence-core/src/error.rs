//! Error types for the presence system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for presence operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the presence system
#[derive(Error, Debug)]
pub enum Error {
    /// Activity source errors (log database unreachable, query failed)
    #[error("Activity source error: {0}")]
    ActivitySource(String),

    /// A configured device has never been observed by the activity source
    #[error("Device {device} has no recorded activity")]
    DeviceNotSeen {
        /// Configured device name
        device: String,
    },

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notification(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an activity source error
    pub fn activity_source(msg: impl Into<String>) -> Self {
        Self::ActivitySource(msg.into())
    }

    /// Create a "device not seen" error
    pub fn device_not_seen(device: impl Into<String>) -> Self {
        Self::DeviceNotSeen {
            device: device.into(),
        }
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a notification error
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// Whether this error was raised while acquiring observations
    pub fn is_acquisition(&self) -> bool {
        matches!(self, Self::ActivitySource(_) | Self::DeviceNotSeen { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
