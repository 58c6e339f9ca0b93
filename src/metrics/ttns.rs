//! Time-to-Network-Settled, legacy variant (TTNS)
//!
//! Single-wave precursor of [`TnsMetric`](crate::metrics::TnsMetric) with a
//! fixed 100 ms initial-resource window. Every failure collapses to `None`.

use crate::app_state::AppStateHistory;
use crate::metrics::predicates::{
    NetworkSettledResourcePredicate, ResourceParams, TimeBasedResourcePredicate,
};
use crate::metrics::NetworkSettledTracking;
use crate::types::{add_seconds, seconds_between, ResourceId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Per-view TTNS state machine
#[derive(Debug, Clone)]
pub struct TtnsMetric {
    view_name: String,
    view_start: DateTime<Utc>,
    predicate: TimeBasedResourcePredicate,
    is_view_active: bool,
    pending_resources: HashMap<ResourceId, DateTime<Utc>>,
    /// End of the latest completed initial resource
    latest_resource_end: Option<DateTime<Utc>>,
    /// Returned again while resources are pending
    last_returned_value: Option<f64>,
}

impl TtnsMetric {
    pub fn new(view_name: impl Into<String>, view_start: DateTime<Utc>) -> Self {
        Self {
            view_name: view_name.into(),
            view_start,
            predicate: TimeBasedResourcePredicate::default(),
            is_view_active: true,
            pending_resources: HashMap::new(),
            latest_resource_end: None,
            last_returned_value: None,
        }
    }

    pub fn track_resource_start(&mut self, start: DateTime<Utc>, resource_id: ResourceId, resource_url: &str) {
        if !self.is_view_active || start < self.view_start {
            return;
        }

        let params = ResourceParams {
            url: resource_url.to_string(),
            time_since_view_start: seconds_between(start, self.view_start),
            view_name: self.view_name.clone(),
        };
        if self.predicate.is_initial_resource(&params) {
            self.pending_resources.insert(resource_id, start);
        }
    }

    pub fn track_resource_end(&mut self, end: DateTime<Utc>, resource_id: ResourceId, resource_duration: Option<f64>) {
        if !self.is_view_active {
            return;
        }
        let Some(start) = self.pending_resources.get(&resource_id).copied() else {
            return;
        };

        let duration = resource_duration.unwrap_or_else(|| seconds_between(end, start));
        if duration < 0.0 {
            return;
        }
        let Some(resource_end) = add_seconds(start, duration) else {
            return;
        };

        self.latest_resource_end = Some(match self.latest_resource_end {
            Some(latest) => latest.max(resource_end),
            None => resource_end,
        });
        self.pending_resources.remove(&resource_id);
    }

    pub fn track_resource_dropped(&mut self, resource_id: ResourceId) {
        self.pending_resources.remove(&resource_id);
    }

    pub fn track_view_was_stopped(&mut self) {
        self.is_view_active = false;
    }

    /// TTNS value as of `now`.
    ///
    /// Unavailable until the initial-resource window has elapsed, since more
    /// initial resources may still start. While resources are pending, the
    /// previously returned value is repeated.
    pub fn value(&mut self, now: DateTime<Utc>, app_state_history: &AppStateHistory) -> Option<f64> {
        let window_end = add_seconds(self.view_start, self.predicate.threshold)?;
        if now < window_end {
            return None;
        }
        if !self.pending_resources.is_empty() {
            return self.last_returned_value;
        }
        let latest_resource_end = self.latest_resource_end?;

        let value = seconds_between(latest_resource_end, self.view_start);
        if value < 0.0 {
            self.last_returned_value = None;
            return None;
        }

        let is_valid = add_seconds(self.view_start, value)
            .is_some_and(|loaded_at| app_state_history.was_always_active(self.view_start..=loaded_at));
        if !is_valid {
            self.last_returned_value = None;
            return None;
        }

        self.last_returned_value = Some(value);
        Some(value)
    }
}

impl NetworkSettledTracking for TtnsMetric {
    type Value = Option<f64>;

    fn track_resource_start(&mut self, start: DateTime<Utc>, resource_id: ResourceId, resource_url: &str) {
        TtnsMetric::track_resource_start(self, start, resource_id, resource_url)
    }

    fn track_resource_end(&mut self, end: DateTime<Utc>, resource_id: ResourceId, resource_duration: Option<f64>) {
        TtnsMetric::track_resource_end(self, end, resource_id, resource_duration)
    }

    fn track_resource_dropped(&mut self, resource_id: ResourceId) {
        TtnsMetric::track_resource_dropped(self, resource_id)
    }

    fn track_view_was_stopped(&mut self) {
        TtnsMetric::track_view_was_stopped(self)
    }

    fn value(&mut self, now: DateTime<Utc>, app_state_history: &AppStateHistory) -> Self::Value {
        TtnsMetric::value(self, now, app_state_history)
    }
}
