//! Presence engine
//!
//! The PresenceEngine runs one evaluation cycle:
//! - Reading the last observation of every enabled device via ActivitySource
//! - Classifying and reconciling each device against the PresenceStore
//! - Persisting all updated states with a single flush
//! - Delivering due transitions via the Notifier
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐
//! │ ActivitySource │─── Observation ───┐
//! └────────────────┘                   │
//!                                      ▼
//!                            ┌────────────────┐
//!                            │ PresenceEngine │
//!                            └────────────────┘
//!                                      │
//!         ┌────────────────────────────┼────────────────────────────┐
//!         │                            │                            │
//!         ▼                            ▼                            ▼
//! ┌───────────────┐           ┌───────────────┐           ┌───────────────┐
//! │ PresenceStore │           │   Notifier    │           │    Events     │
//! │ (reconcile)   │           │ (transitions) │           │  (monitoring) │
//! └───────────────┘           └───────────────┘           └───────────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. Acquire observations for all devices; any failure aborts the run
//!    before state is touched
//! 2. Reconcile each device (buffered `set_state`)
//! 3. Flush the store once
//! 4. Deliver notifications; failures are reported, never rolled back

use crate::config::{DeviceConfig, PresenceConfig};
use crate::error::{Error, Result};
use crate::presence;
use crate::traits::{ActivitySource, Notifier, Observation, PresenceStore};
use crate::transition::{self, DeviceState, PresenceStatus, TransitionEvent};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Events emitted by the PresenceEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A cycle started
    RunStarted { devices: usize },

    /// A device was classified
    DeviceEvaluated { device: String, is_active: bool },

    /// A reportable transition was found
    TransitionDetected {
        device: String,
        status: PresenceStatus,
    },

    /// Updated states were written to the store
    StatePersisted { devices: usize },

    /// A transition notification was delivered
    NotificationSent { device: String },

    /// A transition notification could not be delivered
    NotificationFailed { device: String, error: String },

    /// The cycle finished
    RunFinished { transitions: usize },
}

/// Outcome of evaluating a single device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceOutcome {
    pub device: String,
    pub observation: Observation,
    pub is_active: bool,
    /// State written to the store
    pub state: DeviceState,
    /// A notification was due for this device this cycle
    pub notified_now: bool,
}

/// A transition whose notification could not be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub event: TransitionEvent,
    pub error: String,
}

/// Summary of one evaluation cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Clock used for classification (epoch seconds)
    pub now: i64,
    /// One entry per evaluated device, in configuration order
    pub outcomes: Vec<DeviceOutcome>,
    /// Transitions emitted this cycle
    pub transitions: Vec<TransitionEvent>,
    /// Transitions whose notification failed
    pub delivery_failures: Vec<DeliveryFailure>,
}

impl RunReport {
    /// True when every due notification was delivered
    pub fn is_clean(&self) -> bool {
        self.delivery_failures.is_empty()
    }
}

/// Core presence engine
///
/// One engine instance performs one cycle per call to [`run_once`](Self::run_once).
/// Devices are processed strictly sequentially.
///
/// ## Single Writer
///
/// The store is read-modify-written without locking across processes; only
/// one run may execute at a time. Scheduling is external (e.g. a systemd timer).
pub struct PresenceEngine {
    /// Source of last-seen observations
    source: Box<dyn ActivitySource>,

    /// Per-device state
    store: Box<dyn PresenceStore>,

    /// Delivery channel for transitions
    notifier: Box<dyn Notifier>,

    /// Devices to evaluate (enabled only, configuration order)
    devices: Vec<DeviceConfig>,

    /// Recency window in minutes
    last_seen_delta_mins: u64,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl PresenceEngine {
    /// Create a new presence engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        source: Box<dyn ActivitySource>,
        store: Box<dyn PresenceStore>,
        notifier: Box<dyn Notifier>,
        config: PresenceConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);
        let devices = config.enabled_devices().cloned().collect();

        let engine = Self {
            source,
            store,
            notifier,
            devices,
            last_seen_delta_mins: config.last_seen_delta_mins,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// The configured notifier
    ///
    /// Exposed so callers can report fatal run errors through the same channel.
    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// Run one cycle using the current UTC time
    pub async fn run_once(&self) -> Result<RunReport> {
        self.run_at(chrono::Utc::now().timestamp()).await
    }

    /// Run one cycle against an explicit clock (epoch seconds)
    ///
    /// # Returns
    ///
    /// - `Ok(RunReport)`: State was persisted; check [`RunReport::is_clean`]
    ///   for notification delivery
    /// - `Err(Error)`: Fatal error; nothing was persisted or sent
    pub async fn run_at(&self, now: i64) -> Result<RunReport> {
        self.emit_event(EngineEvent::RunStarted {
            devices: self.devices.len(),
        });

        let observations = self.acquire().await?;

        let mut report = RunReport {
            now,
            ..RunReport::default()
        };

        for (device, observation) in observations {
            let is_active =
                presence::is_active(now, observation.last_seen, self.last_seen_delta_mins);
            self.emit_event(EngineEvent::DeviceEvaluated {
                device: device.clone(),
                is_active,
            });

            let previous = self.store.get_state(&device).await?.unwrap_or_default();
            let outcome =
                transition::reconcile(&device, previous, is_active, observation.last_seen);

            match &outcome.event {
                Some(event) => {
                    info!("{}", event);
                    self.emit_event(EngineEvent::TransitionDetected {
                        device: device.clone(),
                        status: event.status,
                    });
                    report.transitions.push(event.clone());
                }
                None => {
                    info!(
                        "Device {} not changed - {}",
                        device,
                        PresenceStatus::from(is_active)
                    );
                }
            }

            self.store.set_state(&device, outcome.state).await?;

            report.outcomes.push(DeviceOutcome {
                device,
                observation,
                is_active,
                state: outcome.state,
                notified_now: outcome.event.is_some(),
            });
        }

        self.store.flush().await?;
        debug!("Persisted state for {} device(s)", report.outcomes.len());
        self.emit_event(EngineEvent::StatePersisted {
            devices: report.outcomes.len(),
        });

        for event in &report.transitions {
            if let Some(failure) = self.deliver(event).await {
                report.delivery_failures.push(failure);
            }
        }

        self.emit_event(EngineEvent::RunFinished {
            transitions: report.transitions.len(),
        });

        Ok(report)
    }

    /// Read the latest observation of every device
    ///
    /// A device the source has never seen cannot be classified and fails the
    /// whole run.
    async fn acquire(&self) -> Result<Vec<(String, Observation)>> {
        let mut observations = Vec::with_capacity(self.devices.len());

        for device in &self.devices {
            let observation = self
                .source
                .last_seen(&device.name)
                .await
                .map_err(|e| match e {
                    Error::ActivitySource(_) | Error::DeviceNotSeen { .. } => e,
                    other => Error::activity_source(format!(
                        "{} failed for {}: {}",
                        self.source.source_name(),
                        device.name,
                        other
                    )),
                })?
                .ok_or_else(|| Error::device_not_seen(&device.name))?;

            debug!(
                "Device {} last seen at {} via {}",
                device.name, observation.last_seen, observation.client
            );
            observations.push((device.name.clone(), observation));
        }

        Ok(observations)
    }

    /// Send one transition through the notifier
    async fn deliver(&self, event: &TransitionEvent) -> Option<DeliveryFailure> {
        match self.notifier.notify(&event.message(), "").await {
            Ok(()) => {
                self.emit_event(EngineEvent::NotificationSent {
                    device: event.device.clone(),
                });
                None
            }
            Err(e) => {
                error!(
                    "Failed to deliver notification for {} via {}: {}",
                    event.device,
                    self.notifier.notifier_name(),
                    e
                );
                self.emit_event(EngineEvent::NotificationFailed {
                    device: event.device.clone(),
                    error: e.to_string(),
                });
                Some(DeliveryFailure {
                    event: event.clone(),
                    error: e.to_string(),
                })
            }
        }
    }

    /// Emit an engine event
    ///
    /// Events are dropped with a warning when the channel is full or closed.
    fn emit_event(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full or closed, dropping event");
        }
    }
}
