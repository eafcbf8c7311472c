// # Memory State Store
//
// In-memory implementation of PresenceStore.
//
// ## Purpose
//
// Provides a store that doesn't persist across runs. Useful for tests and
// dry runs against a live query log.
//
// ## Behavior Across Runs
//
// - Every run starts from `{status: false, notified: false}` for all devices
// - Devices currently active are therefore reported as ACTIVE on every run

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StateStoreConfig;
use crate::traits::state_store::{PresenceStore, StateStoreFactory};
use crate::transition::DeviceState;

/// In-memory presence store implementation
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<HashMap<String, DeviceState>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with device states
    pub fn with_states<I, S>(states: I) -> Self
    where
        I: IntoIterator<Item = (S, DeviceState)>,
        S: Into<String>,
    {
        let map = states.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Get the number of devices in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl PresenceStore for MemoryStateStore {
    async fn get_state(&self, device: &str) -> Result<Option<DeviceState>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(device).copied())
    }

    async fn set_state(&self, device: &str, state: DeviceState) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(device.to_string(), state);
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing to persist
        Ok(())
    }
}

/// Factory for [`MemoryStateStore`]
pub struct MemoryStateStoreFactory;

#[async_trait]
impl StateStoreFactory for MemoryStateStoreFactory {
    async fn create(&self, _config: &StateStoreConfig) -> Result<Box<dyn PresenceStore>, Error> {
        Ok(Box::new(MemoryStateStore::new()))
    }
}
