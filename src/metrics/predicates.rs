//! Classification predicates
//!
//! Pure policies deciding which resources count as "initial" for the
//! network-settled metrics and which action counts as the "last interaction"
//! for the next-view metrics. Predicates may be called from any thread and
//! must return the same answer for the same parameters.

use crate::types::ActionType;
use serde::{Deserialize, Serialize};

/// Default window after view start in which a resource is considered initial (100 ms)
pub const DEFAULT_RESOURCE_THRESHOLD_SEC: f64 = 0.1;

/// Default maximum gap between the last interaction and the next view (3 s)
pub const DEFAULT_MAX_TIME_TO_NEXT_VIEW_SEC: f64 = 3.0;

/// Parameters describing a resource at the moment it starts
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceParams {
    /// URL of the resource
    pub url: String,
    /// Seconds from view start to resource start (negative if it started earlier)
    pub time_since_view_start: f64,
    /// Name of the view the resource belongs to
    pub view_name: String,
}

/// Parameters describing a candidate "last interaction"
#[derive(Debug, Clone, PartialEq)]
pub struct ActionParams {
    pub action_type: ActionType,
    pub name: String,
    /// Seconds from the action's relevant instant to the next view start
    pub time_to_next_view: f64,
    pub next_view_name: String,
}

/// Decides whether a resource is "initial" for the network-settled metric
pub trait NetworkSettledResourcePredicate: Send + Sync {
    fn is_initial_resource(&self, params: &ResourceParams) -> bool;
}

/// Decides whether an action is the "last interaction" before the next view
pub trait NextViewActionPredicate: Send + Sync {
    fn is_last_action(&self, params: &ActionParams) -> bool;
}

impl<F> NetworkSettledResourcePredicate for F
where
    F: Fn(&ResourceParams) -> bool + Send + Sync,
{
    fn is_initial_resource(&self, params: &ResourceParams) -> bool {
        self(params)
    }
}

impl<F> NextViewActionPredicate for F
where
    F: Fn(&ActionParams) -> bool + Send + Sync,
{
    fn is_last_action(&self, params: &ActionParams) -> bool {
        self(params)
    }
}

/// Which classification policy a metric was computed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateKind {
    TimeBased,
    Custom,
}

/// Accepts resources that start within `threshold` seconds of the view start
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeBasedResourcePredicate {
    pub threshold: f64,
}

impl Default for TimeBasedResourcePredicate {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_RESOURCE_THRESHOLD_SEC,
        }
    }
}

impl TimeBasedResourcePredicate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl NetworkSettledResourcePredicate for TimeBasedResourcePredicate {
    fn is_initial_resource(&self, params: &ResourceParams) -> bool {
        params.time_since_view_start >= 0.0 && params.time_since_view_start <= self.threshold
    }
}

/// Accepts taps, clicks and swipes that happen at most `max_time_to_next_view`
/// seconds before the next view starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeBasedActionPredicate {
    pub max_time_to_next_view: f64,
}

impl Default for TimeBasedActionPredicate {
    fn default() -> Self {
        Self {
            max_time_to_next_view: DEFAULT_MAX_TIME_TO_NEXT_VIEW_SEC,
        }
    }
}

impl TimeBasedActionPredicate {
    pub fn new(max_time_to_next_view: f64) -> Self {
        Self {
            max_time_to_next_view,
        }
    }
}

impl NextViewActionPredicate for TimeBasedActionPredicate {
    fn is_last_action(&self, params: &ActionParams) -> bool {
        let eligible_type = matches!(
            params.action_type,
            ActionType::Tap | ActionType::Click | ActionType::Swipe
        );
        eligible_type
            && params.time_to_next_view >= 0.0
            && params.time_to_next_view <= self.max_time_to_next_view
    }
}
