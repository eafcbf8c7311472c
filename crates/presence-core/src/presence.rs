//! Recency classification
//!
//! A device is *active* when its last observed query lies strictly inside the
//! configured window around the current time.

/// Classify a device as active from its last observation
///
/// Returns `true` iff `|now - last_seen| < delta_minutes * 60`. A device seen
/// exactly `delta_minutes` ago is inactive. Both timestamps are epoch seconds.
pub fn is_active(now: i64, last_seen: i64, delta_minutes: u64) -> bool {
    now.abs_diff(last_seen) < delta_minutes.saturating_mul(60)
}
