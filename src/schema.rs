//! View event input schema
//!
//! Events are JSON objects tagged by `"type"`, supplied either as
//! newline-delimited JSON (one event per line) or as a JSON array. They mirror
//! the tracker calls one to one, so a recorded session can be replayed
//! through [`ViewMetricsProcessor`](crate::pipeline::ViewMetricsProcessor).

use crate::app_state::AppState;
use crate::error::MetricsError;
use crate::types::{ActionType, ResourceId, ViewId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current event schema version
pub const SCHEMA_VERSION: &str = "viewtime.event.v1";

/// A single recorded event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewEvent {
    /// A view became visible
    ViewStart {
        view_id: ViewId,
        name: String,
        time: DateTime<Utc>,
    },
    /// A view stopped being visible. Its metrics are reported at this point.
    ViewStop {
        view_id: ViewId,
        time: DateTime<Utc>,
    },
    /// A view will receive no more events and may release its predecessor
    ViewComplete { view_id: ViewId },
    /// A user action on a view
    Action {
        view_id: ViewId,
        action_type: ActionType,
        name: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    },
    ResourceStart {
        view_id: ViewId,
        resource_id: ResourceId,
        url: String,
        time: DateTime<Utc>,
    },
    ResourceEnd {
        view_id: ViewId,
        resource_id: ResourceId,
        time: DateTime<Utc>,
        /// Measured duration in seconds, preferred over `time - start`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    ResourceDropped {
        view_id: ViewId,
        resource_id: ResourceId,
    },
    /// An application state transition
    #[serde(rename = "app_state")]
    AppStateChanged { state: AppState, time: DateTime<Utc> },
    /// Externally computed INV (nanoseconds), reported when INV is disabled
    CustomInv { view_id: ViewId, value_ns: i64 },
}

/// Reasons an event is rejected before processing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EventValidationError {
    #[error("view name must not be empty")]
    EmptyViewName,

    #[error("action ends before it starts")]
    EndBeforeStart,

    #[error("resource duration must be a non-negative finite number, got {0}")]
    InvalidDuration(f64),
}

impl ViewEvent {
    /// Event tag as it appears in JSON
    pub fn kind(&self) -> &'static str {
        match self {
            ViewEvent::ViewStart { .. } => "view_start",
            ViewEvent::ViewStop { .. } => "view_stop",
            ViewEvent::ViewComplete { .. } => "view_complete",
            ViewEvent::Action { .. } => "action",
            ViewEvent::ResourceStart { .. } => "resource_start",
            ViewEvent::ResourceEnd { .. } => "resource_end",
            ViewEvent::ResourceDropped { .. } => "resource_dropped",
            ViewEvent::AppStateChanged { .. } => "app_state",
            ViewEvent::CustomInv { .. } => "custom_inv",
        }
    }

    /// View the event belongs to, if any
    pub fn view_id(&self) -> Option<ViewId> {
        match self {
            ViewEvent::ViewStart { view_id, .. }
            | ViewEvent::ViewStop { view_id, .. }
            | ViewEvent::ViewComplete { view_id }
            | ViewEvent::Action { view_id, .. }
            | ViewEvent::ResourceStart { view_id, .. }
            | ViewEvent::ResourceEnd { view_id, .. }
            | ViewEvent::ResourceDropped { view_id, .. }
            | ViewEvent::CustomInv { view_id, .. } => Some(*view_id),
            ViewEvent::AppStateChanged { .. } => None,
        }
    }

    /// Check the event is well formed on its own
    pub fn validate(&self) -> Result<(), EventValidationError> {
        match self {
            ViewEvent::ViewStart { name, .. } if name.trim().is_empty() => {
                Err(EventValidationError::EmptyViewName)
            }
            ViewEvent::Action {
                start_time,
                end_time,
                ..
            } if end_time < start_time => Err(EventValidationError::EndBeforeStart),
            ViewEvent::ResourceEnd {
                duration: Some(duration),
                ..
            } if !duration.is_finite() || *duration < 0.0 => {
                Err(EventValidationError::InvalidDuration(*duration))
            }
            _ => Ok(()),
        }
    }
}

/// Parse newline-delimited JSON events. Blank lines are skipped.
pub fn parse_ndjson(input: &str) -> Result<Vec<ViewEvent>, MetricsError> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| MetricsError::InvalidEvent {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Parse a JSON array of events
pub fn parse_array(input: &str) -> Result<Vec<ViewEvent>, MetricsError> {
    let values: Vec<serde_json::Value> = serde_json::from_str(input)?;
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value).map_err(|e| MetricsError::InvalidEvent {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Parse events, choosing the array form when the input starts with `[`
pub fn parse_events(input: &str) -> Result<Vec<ViewEvent>, MetricsError> {
    if input.trim_start().starts_with('[') {
        parse_array(input)
    } else {
        parse_ndjson(input)
    }
}

/// Validate every event, failing on the first malformed one
pub fn validate_events(events: &[ViewEvent]) -> Result<(), MetricsError> {
    for (index, event) in events.iter().enumerate() {
        event.validate().map_err(|e| MetricsError::InvalidEvent {
            index,
            reason: e.to_string(),
        })?;
    }
    Ok(())
}
