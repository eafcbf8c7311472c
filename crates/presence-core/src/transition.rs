//! Edge-triggered reconciliation of observed presence against stored state
//!
//! Each run the fresh classification is compared with the stored
//! `{status, notified}` pair:
//!
//! | status | notified | observed | new status | new notified | event |
//! |--------|----------|----------|------------|--------------|-------|
//! | X      | true     | X        | X          | false        | none  |
//! | X      | true     | ¬X       | ¬X         | false        | none  |
//! | X      | false    | X        | X          | false        | none  |
//! | X      | false    | ¬X       | ¬X         | true         | ¬X    |
//!
//! A flip observed on the cycle right after a notification is absorbed
//! without an event: the stored `notified` flag blocks it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Persisted per-device state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Last classification (`true` = active)
    pub status: bool,
    /// Whether a notification already reflects `status`
    pub notified: bool,
}

impl DeviceState {
    pub fn new(status: bool, notified: bool) -> Self {
        Self { status, notified }
    }

    pub fn presence(&self) -> PresenceStatus {
        PresenceStatus::from(self.status)
    }
}

/// Active/inactive classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresenceStatus {
    Active,
    Inactive,
}

impl From<bool> for PresenceStatus {
    fn from(active: bool) -> Self {
        if active {
            PresenceStatus::Active
        } else {
            PresenceStatus::Inactive
        }
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresenceStatus::Active => f.write_str("ACTIVE"),
            PresenceStatus::Inactive => f.write_str("INACTIVE"),
        }
    }
}

/// A reportable change of a device's classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    /// Device name
    pub device: String,
    /// Classification the device changed to
    pub status: PresenceStatus,
    /// Epoch seconds of the observation that caused the change
    pub last_seen: i64,
}

impl TransitionEvent {
    /// Operator-facing message, used as the notification subject
    pub fn message(&self) -> String {
        format!(
            "Device {} changed to {} - lastQuery {}",
            self.device,
            self.status,
            format_timestamp(self.last_seen)
        )
    }
}

impl fmt::Display for TransitionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Result of reconciling one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State to persist
    pub state: DeviceState,
    /// Notification due, if any
    pub event: Option<TransitionEvent>,
}

/// Reconcile a fresh classification against the stored state
///
/// `status` is always overwritten with `is_active`. An event is produced only
/// when the classification disagrees with the stored status and no
/// notification has been sent for the stored status yet; otherwise
/// `notified` is cleared.
pub fn reconcile(
    device: &str,
    previous: DeviceState,
    is_active: bool,
    last_seen: i64,
) -> Transition {
    let changed = is_active != previous.status && !previous.notified;

    let state = DeviceState {
        status: is_active,
        notified: changed,
    };

    let event = changed.then(|| TransitionEvent {
        device: device.to_string(),
        status: PresenceStatus::from(is_active),
        last_seen,
    });

    Transition { state, event }
}

/// Render epoch seconds as ISO-8601 UTC, e.g. `2024-03-01T12:00:00Z`
pub fn format_timestamp(epoch_secs: i64) -> String {
    match DateTime::<Utc>::from_timestamp(epoch_secs, 0) {
        Some(ts) => ts.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => epoch_secs.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEEN: i64 = 1_709_294_400; // 2024-03-01T12:00:00Z

    #[test]
    fn test_inactive_to_active_fires_once() {
        let t = reconcile("Phone", DeviceState::new(false, false), true, SEEN);

        assert_eq!(t.state, DeviceState::new(true, true));
        let event = t.event.expect("transition due");
        assert_eq!(event.status, PresenceStatus::Active);
        assert_eq!(
            event.message(),
            "Device Phone changed to ACTIVE - lastQuery 2024-03-01T12:00:00Z"
        );
    }

    #[test]
    fn test_active_to_inactive_message() {
        let t = reconcile("Laptop", DeviceState::new(true, false), false, SEEN);

        assert_eq!(t.state, DeviceState::new(false, true));
        assert_eq!(
            t.event.unwrap().to_string(),
            "Device Laptop changed to INACTIVE - lastQuery 2024-03-01T12:00:00Z"
        );
    }

    #[test]
    fn test_agreement_after_notification_clears_flag() {
        let t = reconcile("Phone", DeviceState::new(true, true), true, SEEN);

        assert_eq!(t.state, DeviceState::new(true, false));
        assert!(t.event.is_none());
    }

    #[test]
    fn test_flip_right_after_notification_is_absorbed() {
        let t = reconcile("Phone", DeviceState::new(true, true), false, SEEN);

        assert_eq!(t.state, DeviceState::new(false, false));
        assert!(t.event.is_none());
    }

    #[test]
    fn test_stable_unnotified_state_stays_quiet() {
        for status in [true, false] {
            let t = reconcile("Phone", DeviceState::new(status, false), status, SEEN);
            assert_eq!(t.state, DeviceState::new(status, false));
            assert!(t.event.is_none());
        }
    }

    #[test]
    fn test_format_timestamp_out_of_range_falls_back() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_timestamp(i64::MAX), i64::MAX.to_string());
    }

    #[test]
    fn test_presence_status_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&PresenceStatus::Active).unwrap(), "\"ACTIVE\"");
        assert_eq!(DeviceState::new(false, true).presence(), PresenceStatus::Inactive);
    }
}
