//! Interaction-to-Next-View, legacy variant (ITNV)
//!
//! Precursor of [`InvMetric`](crate::metrics::InvMetric). Only the most recent
//! action of each view is kept, and it counts when it is a tap, click or swipe
//! that happened at most 3 s before the next view started. Every failure
//! collapses to `None`.

use crate::metrics::predicates::DEFAULT_MAX_TIME_TO_NEXT_VIEW_SEC;
use crate::metrics::NextViewTracking;
use crate::types::{seconds_between, ActionType, ViewId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct LastAction {
    action_type: ActionType,
    /// Start for discrete actions, end for continuous ones
    anchor: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct View {
    start: DateTime<Utc>,
    previous_view_id: Option<ViewId>,
    last_action: Option<LastAction>,
}

/// ITNV state machine spanning all views of a session
#[derive(Debug, Clone, Default)]
pub struct ItnvMetric {
    views: HashMap<ViewId, View>,
    current_view_id: Option<ViewId>,
}

impl ItnvMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_view_start(&mut self, start: DateTime<Utc>, view_id: ViewId) {
        self.views.insert(
            view_id,
            View {
                start,
                previous_view_id: self.current_view_id,
                last_action: None,
            },
        );
        self.current_view_id = Some(view_id);
    }

    pub fn track_action(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        action_type: ActionType,
        view_id: ViewId,
    ) {
        let Some(view) = self.views.get_mut(&view_id) else {
            return;
        };
        if start < view.start {
            return;
        }

        let anchor = if action_type.is_continuous() {
            end
        } else {
            start
        };
        let is_newer = view.last_action.map_or(true, |last| anchor >= last.anchor);
        if is_newer {
            view.last_action = Some(LastAction {
                action_type,
                anchor,
            });
        }
    }

    pub fn track_view_complete(&mut self, view_id: ViewId) {
        if let Some(previous_view_id) = self.views.get(&view_id).and_then(|v| v.previous_view_id) {
            self.views.remove(&previous_view_id);
        }
    }

    pub fn value(&self, view_id: ViewId) -> Option<f64> {
        let view = self.views.get(&view_id)?;
        let previous_view = self.views.get(&view.previous_view_id?)?;
        let last_action = previous_view.last_action?;

        if !matches!(
            last_action.action_type,
            ActionType::Tap | ActionType::Click | ActionType::Swipe
        ) {
            return None;
        }

        let value = seconds_between(view.start, last_action.anchor);
        (0.0..=DEFAULT_MAX_TIME_TO_NEXT_VIEW_SEC)
            .contains(&value)
            .then_some(value)
    }
}

impl NextViewTracking for ItnvMetric {
    type Value = Option<f64>;

    fn track_view_start(&mut self, start: DateTime<Utc>, _name: &str, view_id: ViewId) {
        ItnvMetric::track_view_start(self, start, view_id)
    }

    fn track_action(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _name: &str,
        action_type: ActionType,
        view_id: ViewId,
    ) {
        ItnvMetric::track_action(self, start, end, action_type, view_id)
    }

    fn track_view_complete(&mut self, view_id: ViewId) {
        ItnvMetric::track_view_complete(self, view_id)
    }

    fn value(&mut self, view_id: ViewId) -> Self::Value {
        ItnvMetric::value(self, view_id)
    }
}
