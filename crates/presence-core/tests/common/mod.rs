//! Test doubles and common utilities for presence contract tests
//!
//! These doubles record every call so tests can assert on what the engine
//! did, not just on what it returned.

#![allow(dead_code)]

use presence_core::config::{DeviceConfig, NotifierConfig, PresenceConfig, StateStoreConfig};
use presence_core::error::{Error, Result};
use presence_core::traits::{ActivitySource, Notifier, Observation, PresenceStore};
use presence_core::{DeviceState, MemoryStateStore};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Start of the test clock: 2024-03-01T12:00:00Z
pub const T0: i64 = 1_709_294_400;

/// Threshold used by [`config`]
pub const DELTA_MINS: u64 = 5;

/// An activity source whose observations are set by the test
///
/// Clones share the same script.
#[derive(Clone, Default)]
pub struct ScriptedActivitySource {
    last_seen: Arc<Mutex<HashMap<String, i64>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedActivitySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a query for `device` at `timestamp`
    pub fn set_last_seen(&self, device: &str, timestamp: i64) {
        self.last_seen
            .lock()
            .unwrap()
            .insert(device.to_lowercase(), timestamp);
    }

    /// Make lookups of `device` fail with a source error
    pub fn fail_for(&self, device: &str) {
        self.failing.lock().unwrap().insert(device.to_lowercase());
    }

    /// Number of `last_seen` calls so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ActivitySource for ScriptedActivitySource {
    async fn last_seen(&self, device: &str) -> Result<Option<Observation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = device.to_lowercase();

        if self.failing.lock().unwrap().contains(&key) {
            return Err(Error::activity_source("query log unavailable"));
        }

        Ok(self
            .last_seen
            .lock()
            .unwrap()
            .get(&key)
            .map(|ts| Observation::new("192.168.1.50", *ts)))
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// A notifier that records deliveries and can be told to fail
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    fail: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following delivery fail
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Subjects of successfully delivered messages
    pub fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(subject, _)| subject.clone())
            .collect()
    }

    /// All delivered (subject, body) pairs
    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Delivery attempts, including failed ones
    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::notification("relay refused connection"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "recording"
    }
}

/// A memory store that counts writes and flushes
///
/// `persisted()` only reflects state as of the last flush, like a real file.
#[derive(Clone, Default)]
pub struct CountingStore {
    live: MemoryStateStore,
    persisted: Arc<Mutex<HashMap<String, DeviceState>>>,
    set_calls: Arc<AtomicUsize>,
    flush_calls: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed both the live and the persisted view
    pub fn with_states(states: &[(&str, DeviceState)]) -> Self {
        let persisted = states
            .iter()
            .map(|(name, state)| (name.to_string(), *state))
            .collect();
        Self {
            live: MemoryStateStore::with_states(states.iter().map(|(n, s)| (n.to_string(), *s))),
            persisted: Arc::new(Mutex::new(persisted)),
            ..Self::default()
        }
    }

    pub fn persisted(&self, device: &str) -> Option<DeviceState> {
        self.persisted.lock().unwrap().get(device).copied()
    }

    pub fn set_call_count(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn flush_call_count(&self) -> usize {
        self.flush_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PresenceStore for CountingStore {
    async fn get_state(&self, device: &str) -> Result<Option<DeviceState>> {
        self.live.get_state(device).await
    }

    async fn set_state(&self, device: &str, state: DeviceState) -> Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.live.set_state(device, state).await
    }

    async fn list_devices(&self) -> Result<Vec<String>> {
        self.live.list_devices().await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_calls.fetch_add(1, Ordering::SeqCst);
        let mut snapshot = Vec::new();
        for device in self.live.list_devices().await? {
            if let Some(state) = self.live.get_state(&device).await? {
                snapshot.push((device, state));
            }
        }
        self.persisted.lock().unwrap().extend(snapshot);
        Ok(())
    }
}

/// Minimal valid configuration for the given device names
pub fn config(devices: &[&str]) -> PresenceConfig {
    PresenceConfig {
        state_store: StateStoreConfig::Memory,
        notifier: NotifierConfig::Log,
        devices: devices.iter().map(|name| DeviceConfig::new(*name)).collect(),
        last_seen_delta_mins: DELTA_MINS,
        ..PresenceConfig::new()
    }
}
