//! Configuration types for the presence system
//!
//! Configuration is immutable for the lifetime of a run. Per-device runtime
//! state (`status`, `notified`) is never stored here; it belongs to the
//! [`PresenceStore`](crate::traits::PresenceStore).
//!
//! ## File Format
//!
//! ```json
//! {
//!   "activity_source": { "type": "pihole", "db_path": "/etc/pihole/pihole-FTL.db" },
//!   "state_store": { "type": "file", "path": "/var/lib/presenced/state.json" },
//!   "notifier": {
//!     "type": "smtp",
//!     "host": "smtp.example.com",
//!     "from": "presenced@example.com",
//!     "to": "ops@example.com"
//!   },
//!   "devices": [ { "name": "Phone" }, { "name": "Laptop", "enabled": false } ],
//!   "last_seen_delta_mins": 5
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Default location of the Pi-hole FTL database
pub const DEFAULT_PIHOLE_DB_PATH: &str = "/etc/pihole/pihole-FTL.db";

/// Default state file, relative to the working directory
pub const DEFAULT_STATE_PATH: &str = "state.json";

/// Main presence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Where observations come from
    #[serde(default)]
    pub activity_source: ActivitySourceConfig,

    /// Where per-device state is persisted
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// How transitions are delivered
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Devices to monitor, evaluated in this order
    pub devices: Vec<DeviceConfig>,

    /// Recency window in minutes; a device seen less than this long ago is active
    #[serde(default = "default_last_seen_delta_mins")]
    pub last_seen_delta_mins: u64,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl PresenceConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            activity_source: ActivitySourceConfig::default(),
            state_store: StateStoreConfig::default(),
            notifier: NotifierConfig::default(),
            devices: Vec::new(),
            last_seen_delta_mins: default_last_seen_delta_mins(),
            engine: EngineConfig::default(),
        }
    }

    /// Parse a configuration document
    ///
    /// The document is validated before it is returned.
    pub fn from_json(content: &str) -> Result<Self, crate::Error> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| crate::Error::config(format!("Invalid configuration document: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration document from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!(
                "Failed to read configuration {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.devices.is_empty() {
            return Err(crate::Error::config("No devices configured"));
        }

        // Sources match names case-insensitively
        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                return Err(crate::Error::config("Device name cannot be empty"));
            }
            if !seen.insert(device.name.to_lowercase()) {
                return Err(crate::Error::config(format!(
                    "Device {} is configured more than once",
                    device.name
                )));
            }
        }

        if self.last_seen_delta_mins == 0 {
            return Err(crate::Error::config("last_seen_delta_mins must be > 0"));
        }

        if self.engine.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }

        self.activity_source.validate()?;
        self.state_store.validate()?;
        self.notifier.validate()?;

        Ok(())
    }

    /// Devices that take part in evaluation
    pub fn enabled_devices(&self) -> impl Iterator<Item = &DeviceConfig> {
        self.devices.iter().filter(|d| d.enabled)
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Activity source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivitySourceConfig {
    /// Pi-hole FTL query database
    Pihole {
        /// Path to `pihole-FTL.db`
        db_path: String,
    },

    /// Custom activity source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ActivitySourceConfig {
    /// Validate the activity source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ActivitySourceConfig::Pihole { db_path } => {
                if db_path.is_empty() {
                    return Err(crate::Error::config("Pi-hole database path cannot be empty"));
                }
                Ok(())
            }
            ActivitySourceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom activity source factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom activity source config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the activity source type name
    pub fn type_name(&self) -> &str {
        match self {
            ActivitySourceConfig::Pihole { .. } => "pihole",
            ActivitySourceConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ActivitySourceConfig {
    fn default() -> Self {
        ActivitySourceConfig::Pihole {
            db_path: DEFAULT_PIHOLE_DB_PATH.to_string(),
        }
    }
}

/// State store configuration
///
/// Defaults to a file store in the working directory. The memory store
/// forgets state between runs and repeats every notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent, dry runs only)
    Memory,

    /// Custom state store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        StateStoreConfig::File {
            path: DEFAULT_STATE_PATH.to_string(),
        }
    }
}

impl StateStoreConfig {
    /// Validate the state store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StateStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("State file path cannot be empty"))
            }
            StateStoreConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::config("Custom state store factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    /// Get the state store type name
    pub fn type_name(&self) -> &str {
        match self {
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
            StateStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Notifier configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// Plain-text mail over SMTP
    Smtp {
        /// SMTP relay hostname
        host: String,
        /// SMTP port (STARTTLS), 587 when omitted
        #[serde(default)]
        port: Option<u16>,
        /// Sender address
        from: String,
        /// Recipient address
        to: String,
        /// Optional SMTP username
        #[serde(default)]
        username: Option<String>,
        /// Optional SMTP password
        #[serde(default)]
        password: Option<String>,
        /// Optional prefix prepended to every subject, e.g. `[presence]`
        #[serde(default)]
        subject_prefix: Option<String>,
    },

    /// Write notifications to the log only
    #[default]
    Log,

    /// Custom notifier
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl NotifierConfig {
    /// Validate the notifier configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            NotifierConfig::Smtp { host, from, to, .. } => {
                if host.is_empty() {
                    return Err(crate::Error::config("SMTP host cannot be empty"));
                }
                if from.is_empty() || to.is_empty() {
                    return Err(crate::Error::config(
                        "SMTP sender and recipient addresses are required",
                    ));
                }
                Ok(())
            }
            NotifierConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::config("Custom notifier factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    /// Get the notifier type name
    pub fn type_name(&self) -> &str {
        match self {
            NotifierConfig::Smtp { .. } => "smtp",
            NotifierConfig::Log => "log",
            NotifierConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Monitored device configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device name as registered in the network table (matched case-insensitively)
    pub name: String,

    /// Whether this device is evaluated
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl DeviceConfig {
    /// Create a new device configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
        }
    }

    /// Enable or disable the device
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

fn default_enabled() -> bool {
    true
}

fn default_last_seen_delta_mins() -> u64 {
    5
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped with a warning log.
    ///
    /// Default: 100 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    100
}
