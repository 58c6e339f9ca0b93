//! Core identifiers and time helpers
//!
//! Instants are device-clock `DateTime<Utc>` values with no server offset
//! applied. Intervals are expressed in seconds as `f64`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a view within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewId(pub Uuid);

impl ViewId {
    /// Generate a random view identifier
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier of a resource (network request) within its view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub Uuid);

impl ResourceId {
    /// Generate a random resource identifier
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Kind of user action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Tap,
    Click,
    Swipe,
    Scroll,
    Custom,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Tap => "tap",
            ActionType::Click => "click",
            ActionType::Swipe => "swipe",
            ActionType::Scroll => "scroll",
            ActionType::Custom => "custom",
        }
    }

    /// Continuous actions (scroll, swipe) are anchored at their end instead of their start.
    pub fn is_continuous(&self) -> bool {
        matches!(self, ActionType::Scroll | ActionType::Swipe)
    }
}

/// Seconds elapsed from `earlier` to `later` (negative if `later` precedes `earlier`).
pub fn seconds_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    let delta = later - earlier;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        // Out of microsecond range (hundreds of millennia apart)
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Shift an instant by a (possibly negative) number of seconds.
///
/// `None` when `seconds` is not finite or the result leaves the representable range.
pub fn add_seconds(instant: DateTime<Utc>, seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let micros = (seconds * 1_000_000.0).round();
    if micros.abs() >= i64::MAX as f64 {
        return None;
    }
    instant.checked_add_signed(Duration::microseconds(micros as i64))
}

/// Convert seconds to whole nanoseconds, the unit used by outgoing telemetry.
pub fn seconds_to_nanoseconds(seconds: f64) -> Option<i64> {
    let nanos = (seconds * 1_000_000_000.0).round();
    if nanos.is_finite() && nanos.abs() < i64::MAX as f64 {
        Some(nanos as i64)
    } else {
        None
    }
}

/// Convert whole nanoseconds back to seconds.
pub fn nanoseconds_to_seconds(nanos: i64) -> f64 {
    nanos as f64 / 1_000_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_action_type_serialization() {
        let json = serde_json::to_string(&ActionType::Swipe).unwrap();
        assert_eq!(json, "\"swipe\"");

        let parsed: ActionType = serde_json::from_str("\"click\"").unwrap();
        assert_eq!(parsed, ActionType::Click);
    }

    #[test]
    fn test_continuous_actions() {
        assert!(ActionType::Scroll.is_continuous());
        assert!(ActionType::Swipe.is_continuous());
        assert!(!ActionType::Tap.is_continuous());
        assert!(!ActionType::Click.is_continuous());
        assert!(!ActionType::Custom.is_continuous());
    }

    #[test]
    fn test_seconds_between_and_back() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        let t1 = add_seconds(t0, 1.25).unwrap();

        assert!((seconds_between(t1, t0) - 1.25).abs() < 1e-9);
        assert!((seconds_between(t0, t1) + 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_add_seconds_out_of_range() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();

        assert_eq!(add_seconds(t0, f64::NAN), None);
        assert_eq!(add_seconds(t0, f64::INFINITY), None);
        // Overflows the microsecond count
        assert_eq!(add_seconds(t0, 1.0e13), None);
        // Fits in microseconds but lands past the last representable date
        assert_eq!(add_seconds(t0, 9.0e12), None);
        assert!(add_seconds(t0, 1.0e9).is_some());
    }

    #[test]
    fn test_nanosecond_conversion() {
        assert_eq!(seconds_to_nanoseconds(1.5), Some(1_500_000_000));
        assert_eq!(seconds_to_nanoseconds(f64::INFINITY), None);
        assert!((nanoseconds_to_seconds(250_000_000) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_view_id_is_transparent_in_json() {
        let id = ViewId(Uuid::nil());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }
}
