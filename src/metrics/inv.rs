//! Interaction-to-Next-View (INV)
//!
//! Measures the time from the "last interaction" in a view to the start of the
//! view that follows it. The last interaction is the most recent action
//! accepted by a [`NextViewActionPredicate`], found by scanning the previous
//! view's actions newest first and stopping at the first match.

use crate::metrics::predicates::{ActionParams, NextViewActionPredicate};
use crate::metrics::NextViewTracking;
use crate::types::{seconds_between, ActionType, ViewId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Reasons for a missing INV value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum InvNoValueReason {
    /// No actions were tracked in the previous view
    #[error("no actions were tracked in the previous view")]
    #[serde(rename = "no_action")]
    NoTrackedActions,
    /// No action in the previous view qualified as the last interaction
    #[error("no eligible last interaction in the previous view")]
    #[serde(rename = "no_eligible_action")]
    NoLastInteraction,
    #[error("view has no preceding view")]
    #[serde(rename = "no_previous_view")]
    NoPrecedingView,
    /// The view was never started or was already evicted
    #[error("view is unknown")]
    #[serde(rename = "unknown_view")]
    ViewUnknown,
    /// The previous view was evicted when this view completed
    #[error("previous view was removed")]
    #[serde(rename = "previous_view_removed")]
    PreviousViewRemoved,
    /// Every action in the previous view was invalid
    #[error("all actions in the previous view were invalid")]
    #[serde(rename = "invalid_actions")]
    InvalidTrackedActions,
    /// INV tracking is turned off; never produced by [`InvMetric`] itself
    #[error("metric is disabled")]
    #[serde(rename = "disabled")]
    Disabled,
}

impl InvNoValueReason {
    /// All reasons, in declaration order
    pub const ALL: [InvNoValueReason; 7] = [
        InvNoValueReason::NoTrackedActions,
        InvNoValueReason::NoLastInteraction,
        InvNoValueReason::NoPrecedingView,
        InvNoValueReason::ViewUnknown,
        InvNoValueReason::PreviousViewRemoved,
        InvNoValueReason::InvalidTrackedActions,
        InvNoValueReason::Disabled,
    ];

    /// Machine-readable tag reported with the view
    pub fn as_str(&self) -> &'static str {
        match self {
            InvNoValueReason::NoTrackedActions => "no_action",
            InvNoValueReason::NoLastInteraction => "no_eligible_action",
            InvNoValueReason::NoPrecedingView => "no_previous_view",
            InvNoValueReason::ViewUnknown => "unknown_view",
            InvNoValueReason::PreviousViewRemoved => "previous_view_removed",
            InvNoValueReason::InvalidTrackedActions => "invalid_actions",
            InvNoValueReason::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone)]
struct Action {
    action_type: ActionType,
    name: String,
    start: DateTime<Utc>,
    duration: f64,
}

impl Action {
    /// Seconds from the action's relevant instant to `next_view_start`.
    ///
    /// Discrete actions are anchored at their start, continuous ones at their end.
    fn time_to_next_view(&self, next_view_start: DateTime<Utc>) -> f64 {
        let since_start = seconds_between(next_view_start, self.start);
        if self.action_type.is_continuous() {
            since_start - self.duration
        } else {
            since_start
        }
    }
}

#[derive(Debug, Clone)]
struct View {
    name: String,
    start: DateTime<Utc>,
    /// Lookup key of the view that was active when this one started
    previous_view_id: Option<ViewId>,
    /// Actions not yet discarded by a query, in insertion order
    actions: Vec<Action>,
    /// Monotonic; unaffected by pruning of `actions`
    valid_actions_count: usize,
    invalid_actions_count: usize,
}

/// INV state machine spanning all views of a session
pub struct InvMetric {
    views: HashMap<ViewId, View>,
    current_view_id: Option<ViewId>,
    predicate: Arc<dyn NextViewActionPredicate>,
}

impl InvMetric {
    pub fn new(predicate: Arc<dyn NextViewActionPredicate>) -> Self {
        Self {
            views: HashMap::new(),
            current_view_id: None,
            predicate,
        }
    }

    /// Number of views currently retained
    pub fn retained_views(&self) -> usize {
        self.views.len()
    }

    pub fn track_view_start(&mut self, start: DateTime<Utc>, name: &str, view_id: ViewId) {
        let view = View {
            name: name.to_string(),
            start,
            previous_view_id: self.current_view_id,
            actions: Vec::new(),
            valid_actions_count: 0,
            invalid_actions_count: 0,
        };
        self.views.insert(view_id, view);
        self.current_view_id = Some(view_id);
    }

    pub fn track_action(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        name: &str,
        action_type: ActionType,
        view_id: ViewId,
    ) {
        let Some(view) = self.views.get_mut(&view_id) else {
            trace!(%view_id, "action for unknown view ignored");
            return;
        };

        if start < view.start {
            trace!(%view_id, action = name, "action started before its view");
            view.invalid_actions_count += 1;
            return;
        }

        view.actions.push(Action {
            action_type,
            name: name.to_string(),
            start,
            duration: seconds_between(end, start),
        });
        view.valid_actions_count += 1;
    }

    /// Evicts the previous view of `view_id`; `view_id` itself is kept as it
    /// may still be the previous view of a later one.
    pub fn track_view_complete(&mut self, view_id: ViewId) {
        let Some(previous_view_id) = self.views.get(&view_id).and_then(|v| v.previous_view_id) else {
            return;
        };
        if self.views.remove(&previous_view_id).is_some() {
            debug!(%view_id, %previous_view_id, "previous view evicted");
        }
    }

    pub fn value(&mut self, view_id: ViewId) -> Result<f64, InvNoValueReason> {
        let (next_view_start, next_view_name, previous_view_id) = {
            let view = self.views.get(&view_id).ok_or(InvNoValueReason::ViewUnknown)?;
            let previous = view.previous_view_id.ok_or(InvNoValueReason::NoPrecedingView)?;
            (view.start, view.name.clone(), previous)
        };

        let previous_view = self
            .views
            .get_mut(&previous_view_id)
            .ok_or(InvNoValueReason::PreviousViewRemoved)?;

        if previous_view.valid_actions_count == 0 {
            return Err(if previous_view.invalid_actions_count == 0 {
                InvNoValueReason::NoTrackedActions
            } else {
                InvNoValueReason::InvalidTrackedActions
            });
        }

        let predicate = &self.predicate;
        let last_action = previous_view
            .actions
            .iter()
            .rev()
            .find(|action| {
                let params = ActionParams {
                    action_type: action.action_type,
                    name: action.name.clone(),
                    time_to_next_view: action.time_to_next_view(next_view_start),
                    next_view_name: next_view_name.clone(),
                };
                predicate.is_last_action(&params)
            })
            .cloned();

        match last_action {
            Some(action) => {
                let value = action.time_to_next_view(next_view_start);
                // Later actions may still be appended after the retained one.
                previous_view.actions = vec![action];
                Ok(value)
            }
            None => {
                previous_view.actions.clear();
                Err(InvNoValueReason::NoLastInteraction)
            }
        }
    }
}

impl NextViewTracking for InvMetric {
    type Value = Result<f64, InvNoValueReason>;

    fn track_view_start(&mut self, start: DateTime<Utc>, name: &str, view_id: ViewId) {
        InvMetric::track_view_start(self, start, name, view_id)
    }

    fn track_action(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        name: &str,
        action_type: ActionType,
        view_id: ViewId,
    ) {
        InvMetric::track_action(self, start, end, name, action_type, view_id)
    }

    fn track_view_complete(&mut self, view_id: ViewId) {
        InvMetric::track_view_complete(self, view_id)
    }

    fn value(&mut self, view_id: ViewId) -> Self::Value {
        InvMetric::value(self, view_id)
    }
}
