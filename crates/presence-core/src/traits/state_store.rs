// # Presence Store Trait
//
// Defines the interface for persistent per-device state.
//
// ## Purpose
//
// The store remembers, for every device, the last classification and whether
// a notification has already been sent for it. This is what makes
// notifications exactly-once across runs.
//
// ## Write Discipline
//
// A run mutates state in memory through `set_state` and persists it with a
// single `flush` after every device has been reconciled. A run that fails
// before `flush` leaves the previous state untouched.
//
// ## Implementations
//
// - File-based: JSON file with atomic replace
// - Memory: tests and dry runs

use async_trait::async_trait;

use crate::transition::DeviceState;

/// Trait for presence store implementations
///
/// # Allowed Capabilities
/// - ✅ Perform I/O for persistent storage
/// - ✅ Buffer writes in memory until `flush()`
///
/// # Forbidden Capabilities
/// - ❌ Deciding transitions (owned by `transition::reconcile`)
/// - ❌ Deleting device state (devices are never removed by a run)
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Get the stored state of a device
    ///
    /// # Returns
    ///
    /// - `Ok(Some(DeviceState))`: The stored state
    /// - `Ok(None)`: Nothing stored for this device yet
    /// - `Err(Error)`: Storage error
    async fn get_state(&self, device: &str) -> Result<Option<DeviceState>, crate::Error>;

    /// Replace the state of a device
    ///
    /// Implementations may buffer the change until [`flush`](Self::flush).
    async fn set_state(&self, device: &str, state: DeviceState) -> Result<(), crate::Error>;

    /// List all device names in the store
    async fn list_devices(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing presence stores from configuration
#[async_trait]
pub trait StateStoreFactory: Send + Sync {
    /// Create a PresenceStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::StateStoreConfig,
    ) -> Result<Box<dyn PresenceStore>, crate::Error>;
}
