//! Time-to-Network-Settled (TNS)
//!
//! Measures the time from when a view becomes visible until all of its
//! "initial" resources finish loading. Initial resources are classified by a
//! [`NetworkSettledResourcePredicate`].
//!
//! Resources may settle in several disjoint waves. Once a wave completes its
//! end time becomes the reported value, and it stays reported while a later
//! wave is still loading. When the later wave completes, the value becomes the
//! maximum of both.

use crate::app_state::AppStateHistory;
use crate::metrics::predicates::{NetworkSettledResourcePredicate, ResourceParams};
use crate::metrics::NetworkSettledTracking;
use crate::types::{add_seconds, seconds_between, seconds_to_nanoseconds, ResourceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Reasons for a missing TNS value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum TnsNoValueReason {
    /// No resources were tracked while the view was active
    #[error("no resources were tracked")]
    #[serde(rename = "no_resources")]
    NoTrackedResources,
    /// Resources were tracked but none qualified as initial
    #[error("no resource qualified as initial")]
    #[serde(rename = "no_initial_resources")]
    NoInitialResources,
    /// Initial resources are still loading
    #[error("initial resources are still loading")]
    #[serde(rename = "initial_resources_incomplete")]
    InitialResourcesIncomplete,
    /// The view stopped before its initial resources finished loading
    #[error("view stopped before initial resources settled")]
    #[serde(rename = "not_settled_yet")]
    ViewStoppedBeforeSettled,
    /// The app left the foreground while initial resources were loading
    #[error("app was not in foreground during loading")]
    #[serde(rename = "not_in_foreground")]
    AppNotInForeground,
    /// Every initial resource was dropped
    #[error("all initial resources were dropped")]
    #[serde(rename = "initial_resources_dropped")]
    InitialResourcesDropped,
    /// Every initial resource was invalid
    #[error("all initial resources were invalid")]
    #[serde(rename = "initial_resources_invalid")]
    InitialResourcesInvalid,
    /// The computed value was negative
    #[error("calculated value is invalid")]
    #[serde(rename = "invalid_value")]
    InvalidCalculatedValue,
    #[error("unknown reason")]
    #[serde(rename = "unknown")]
    Unknown,
}

impl TnsNoValueReason {
    /// All reasons, in declaration order
    pub const ALL: [TnsNoValueReason; 9] = [
        TnsNoValueReason::NoTrackedResources,
        TnsNoValueReason::NoInitialResources,
        TnsNoValueReason::InitialResourcesIncomplete,
        TnsNoValueReason::ViewStoppedBeforeSettled,
        TnsNoValueReason::AppNotInForeground,
        TnsNoValueReason::InitialResourcesDropped,
        TnsNoValueReason::InitialResourcesInvalid,
        TnsNoValueReason::InvalidCalculatedValue,
        TnsNoValueReason::Unknown,
    ];

    /// Machine-readable tag reported with the view
    pub fn as_str(&self) -> &'static str {
        match self {
            TnsNoValueReason::NoTrackedResources => "no_resources",
            TnsNoValueReason::NoInitialResources => "no_initial_resources",
            TnsNoValueReason::InitialResourcesIncomplete => "initial_resources_incomplete",
            TnsNoValueReason::ViewStoppedBeforeSettled => "not_settled_yet",
            TnsNoValueReason::AppNotInForeground => "not_in_foreground",
            TnsNoValueReason::InitialResourcesDropped => "initial_resources_dropped",
            TnsNoValueReason::InitialResourcesInvalid => "initial_resources_invalid",
            TnsNoValueReason::InvalidCalculatedValue => "invalid_value",
            TnsNoValueReason::Unknown => "unknown",
        }
    }
}

/// Per-view TNS state machine
pub struct TnsMetric {
    view_name: String,
    view_start: DateTime<Utc>,
    predicate: Arc<dyn NetworkSettledResourcePredicate>,

    is_view_stopped: bool,
    /// All resources started in this view, initial or not
    total_resources_count: usize,
    initial_resources_count: usize,
    /// Initial resources that started before the view or ended with an unusable duration
    invalid_initial_resources_count: usize,
    dropped_initial_resources_count: usize,
    /// Pending initial resources and their start dates
    pending_initial_resources: HashMap<ResourceId, DateTime<Utc>>,

    /// Max end time (relative to view start) of the current wave
    max_resource_end_time: Option<f64>,
    /// Value merged from every wave completed so far
    latest_completed_value: Option<f64>,
}

impl TnsMetric {
    pub fn new(
        view_name: impl Into<String>,
        view_start: DateTime<Utc>,
        predicate: Arc<dyn NetworkSettledResourcePredicate>,
    ) -> Self {
        Self {
            view_name: view_name.into(),
            view_start,
            predicate,
            is_view_stopped: false,
            total_resources_count: 0,
            initial_resources_count: 0,
            invalid_initial_resources_count: 0,
            dropped_initial_resources_count: 0,
            pending_initial_resources: HashMap::new(),
            max_resource_end_time: None,
            latest_completed_value: None,
        }
    }

    pub fn view_start(&self) -> DateTime<Utc> {
        self.view_start
    }

    /// Number of initial resources still loading
    pub fn pending_count(&self) -> usize {
        self.pending_initial_resources.len()
    }

    pub fn track_resource_start(
        &mut self,
        start: DateTime<Utc>,
        resource_id: ResourceId,
        resource_url: &str,
    ) {
        if self.is_view_stopped {
            return;
        }

        self.total_resources_count += 1;

        let params = ResourceParams {
            url: resource_url.to_string(),
            time_since_view_start: seconds_between(start, self.view_start),
            view_name: self.view_name.clone(),
        };
        if !self.predicate.is_initial_resource(&params) {
            return;
        }

        if start < self.view_start {
            trace!(%resource_id, view = %self.view_name, "initial resource started before view");
            self.invalid_initial_resources_count += 1;
            return;
        }

        self.initial_resources_count += 1;

        // A completed wave followed by a new initial resource starts a new wave.
        if self.pending_initial_resources.is_empty() && self.latest_completed_value.is_some() {
            self.max_resource_end_time = None;
        }

        self.pending_initial_resources.insert(resource_id, start);
    }

    pub fn track_resource_end(
        &mut self,
        end: DateTime<Utc>,
        resource_id: ResourceId,
        resource_duration: Option<f64>,
    ) {
        if self.is_view_stopped {
            return;
        }

        let Some(resource_start) = self.pending_initial_resources.remove(&resource_id) else {
            return;
        };

        let duration = resource_duration.unwrap_or_else(|| seconds_between(end, resource_start));
        if !duration.is_finite() || duration < 0.0 {
            trace!(%resource_id, duration, "initial resource ended with an invalid duration");
            self.invalid_initial_resources_count += 1;
            return;
        }

        let resource_end_time = seconds_between(resource_start, self.view_start) + duration;
        self.max_resource_end_time = Some(match self.max_resource_end_time {
            Some(current) => current.max(resource_end_time),
            None => resource_end_time,
        });

        if self.pending_initial_resources.is_empty() {
            self.finalize_wave();
        }
    }

    pub fn track_resource_dropped(&mut self, resource_id: ResourceId) {
        if self.is_view_stopped {
            return;
        }

        if self.pending_initial_resources.remove(&resource_id).is_some() {
            self.dropped_initial_resources_count += 1;
            if self.pending_initial_resources.is_empty() {
                self.finalize_wave();
            }
        }
    }

    pub fn track_view_was_stopped(&mut self) {
        self.is_view_stopped = true;
    }

    /// TNS value, or the reason it is unavailable.
    ///
    /// While a new wave is loading, the value of the previously completed
    /// waves is reported.
    pub fn value(&self, app_state_history: &AppStateHistory) -> Result<f64, TnsNoValueReason> {
        if !self.pending_initial_resources.is_empty() {
            return match self.latest_completed_value {
                Some(previous) => self.validate(previous, app_state_history),
                None if self.is_view_stopped => Err(TnsNoValueReason::ViewStoppedBeforeSettled),
                None => Err(TnsNoValueReason::InitialResourcesIncomplete),
            };
        }

        match self.latest_completed_value {
            Some(settled) => self.validate(settled, app_state_history),
            None => Err(self.no_value_reason()),
        }
    }

    fn finalize_wave(&mut self) {
        if let Some(wave_end_time) = self.max_resource_end_time.take() {
            let merged = match self.latest_completed_value {
                Some(existing) => existing.max(wave_end_time),
                None => wave_end_time,
            };
            debug!(
                view = %self.view_name,
                wave_end_time,
                value = merged,
                "network settled wave completed"
            );
            self.latest_completed_value = Some(merged);
        }
    }

    fn validate(&self, value: f64, app_state_history: &AppStateHistory) -> Result<f64, TnsNoValueReason> {
        if !value.is_finite() || value < 0.0 || seconds_to_nanoseconds(value).is_none() {
            return Err(TnsNoValueReason::InvalidCalculatedValue);
        }

        let Some(loading_end) = add_seconds(self.view_start, value) else {
            return Err(TnsNoValueReason::InvalidCalculatedValue);
        };
        if !app_state_history.was_always_active(self.view_start..=loading_end) {
            return Err(TnsNoValueReason::AppNotInForeground);
        }

        Ok(value)
    }

    fn no_value_reason(&self) -> TnsNoValueReason {
        if self.total_resources_count == 0 {
            TnsNoValueReason::NoTrackedResources
        } else if self.initial_resources_count == 0 {
            TnsNoValueReason::NoInitialResources
        } else if self.invalid_initial_resources_count == self.initial_resources_count {
            TnsNoValueReason::InitialResourcesInvalid
        } else if self.dropped_initial_resources_count == self.initial_resources_count {
            TnsNoValueReason::InitialResourcesDropped
        } else {
            TnsNoValueReason::Unknown
        }
    }
}

impl NetworkSettledTracking for TnsMetric {
    type Value = Result<f64, TnsNoValueReason>;

    fn track_resource_start(&mut self, start: DateTime<Utc>, resource_id: ResourceId, resource_url: &str) {
        TnsMetric::track_resource_start(self, start, resource_id, resource_url)
    }

    fn track_resource_end(&mut self, end: DateTime<Utc>, resource_id: ResourceId, resource_duration: Option<f64>) {
        TnsMetric::track_resource_end(self, end, resource_id, resource_duration)
    }

    fn track_resource_dropped(&mut self, resource_id: ResourceId) {
        TnsMetric::track_resource_dropped(self, resource_id)
    }

    fn track_view_was_stopped(&mut self) {
        TnsMetric::track_view_was_stopped(self)
    }

    fn value(&mut self, _now: DateTime<Utc>, app_state_history: &AppStateHistory) -> Self::Value {
        TnsMetric::value(self, app_state_history)
    }
}
