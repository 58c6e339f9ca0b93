//! View-timing metrics
//!
//! Pure state machines computing per-view metrics from asynchronously arriving
//! action and resource events:
//!
//! - **TNS** (Time-to-Network-Settled) and its legacy precursor **TTNS**
//! - **INV** (Interaction-to-Next-View) and its legacy precursor **ITNV**
//!
//! Trackers hold no locks. The owner must serialize every call into a tracker,
//! and into any view linked to it as a previous view.

pub mod inv;
pub mod itnv;
pub mod predicates;
pub mod tns;
pub mod ttns;

use crate::app_state::AppStateHistory;
use crate::types::{ActionType, ResourceId, ViewId};
use chrono::{DateTime, Utc};

pub use inv::{InvMetric, InvNoValueReason};
pub use itnv::ItnvMetric;
pub use predicates::{
    ActionParams, NetworkSettledResourcePredicate, NextViewActionPredicate, PredicateKind,
    ResourceParams, TimeBasedActionPredicate, TimeBasedResourcePredicate,
};
pub use tns::{TnsMetric, TnsNoValueReason};
pub use ttns::TtnsMetric;

/// Capability shared by the network-settled metrics (TNS, TTNS)
pub trait NetworkSettledTracking {
    /// What `value` reports: a typed result or a plain optional
    type Value;

    /// Track the start of a resource (device time).
    fn track_resource_start(&mut self, start: DateTime<Utc>, resource_id: ResourceId, resource_url: &str);

    /// Track the completion of a resource. `resource_duration`, when given,
    /// takes precedence over `end - start`.
    fn track_resource_end(&mut self, end: DateTime<Utc>, resource_id: ResourceId, resource_duration: Option<f64>);

    /// Track a resource that was abandoned without usable timing.
    fn track_resource_dropped(&mut self, resource_id: ResourceId);

    /// Stop accepting resource events for the view.
    fn track_view_was_stopped(&mut self);

    /// Metric value as of `now`.
    fn value(&mut self, now: DateTime<Utc>, app_state_history: &AppStateHistory) -> Self::Value;
}

/// Capability shared by the next-view metrics (INV, ITNV)
pub trait NextViewTracking {
    type Value;

    /// Start a view; the currently active view becomes its previous view.
    fn track_view_start(&mut self, start: DateTime<Utc>, name: &str, view_id: ViewId);

    /// Track an action in `view_id`, which need not be the active view.
    fn track_action(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        name: &str,
        action_type: ActionType,
        view_id: ViewId,
    );

    /// Mark `view_id` as complete, releasing its previous view.
    fn track_view_complete(&mut self, view_id: ViewId);

    /// Metric value for `view_id`.
    fn value(&mut self, view_id: ViewId) -> Self::Value;
}
