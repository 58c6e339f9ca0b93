//! Application foreground/background state history
//!
//! The settled-network metrics only report a value when the app stayed in the
//! `active` state for the whole loading interval. This module records state
//! transitions over time and answers range queries over them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Application state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    /// Running in the foreground and receiving events
    Active,
    /// Running in the foreground but not receiving events (interruption, transition)
    Inactive,
    /// Running in the background
    Background,
    /// Terminated
    Terminated,
}

impl AppState {
    /// Whether the app is in the foreground, receiving events or not
    pub fn is_running_in_foreground(&self) -> bool {
        matches!(self, AppState::Active | AppState::Inactive)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Snapshot {
    state: AppState,
    date: DateTime<Utc>,
}

/// Chronologically ordered record of app state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppStateHistory {
    /// State at the moment the history was created
    pub initial_state: AppState,
    /// Ordered snapshots, including the initial one
    snapshots: Vec<Snapshot>,
}

impl AppStateHistory {
    /// Create a history starting in `initial_state` at `date`
    pub fn new(initial_state: AppState, date: DateTime<Utc>) -> Self {
        Self {
            initial_state,
            snapshots: vec![Snapshot {
                state: initial_state,
                date,
            }],
        }
    }

    /// History that has been `active` since `date`
    pub fn active_since(date: DateTime<Utc>) -> Self {
        Self::new(AppState::Active, date)
    }

    /// Most recent recorded state
    pub fn current_state(&self) -> AppState {
        self.snapshots
            .last()
            .map(|s| s.state)
            .unwrap_or(self.initial_state)
    }

    /// Record a transition.
    ///
    /// Optimised for monotonic dates; an earlier date triggers a re-sort.
    pub fn append(&mut self, state: AppState, date: DateTime<Utc>) {
        let out_of_order = self.snapshots.last().is_some_and(|last| date < last.date);
        self.snapshots.push(Snapshot { state, date });
        if out_of_order {
            self.snapshots.sort_by_key(|s| s.date);
        }
    }

    /// State in effect at `date`, or `None` if `date` predates the history
    pub fn state_at(&self, date: DateTime<Utc>) -> Option<AppState> {
        self.snapshots
            .iter()
            .rev()
            .find(|s| s.date <= date)
            .map(|s| s.state)
    }

    /// Whether any state overlapping `range` satisfies `predicate`
    pub fn contains_state<F>(&self, range: RangeInclusive<DateTime<Utc>>, predicate: F) -> bool
    where
        F: Fn(AppState) -> bool,
    {
        let mut contains = false;
        self.iterate_states(&range, |state, _| contains = contains || predicate(state));
        contains
    }

    /// Whether the app was `active` for the entire `range`
    pub fn was_always_active(&self, range: RangeInclusive<DateTime<Utc>>) -> bool {
        !self.contains_state(range, |state| state != AppState::Active)
    }

    /// Total seconds spent in a foreground state within `range`
    pub fn foreground_duration(&self, range: RangeInclusive<DateTime<Utc>>) -> f64 {
        let mut total = 0.0;
        self.iterate_states(&range, |state, seconds| {
            if state.is_running_in_foreground() {
                total += seconds;
            }
        });
        total
    }

    /// Visit each state interval overlapping `range`, clamped to its upper bound.
    ///
    /// Intervals that start before the lower bound are clamped to it; the last
    /// state extends indefinitely.
    fn iterate_states<F>(&self, range: &RangeInclusive<DateTime<Utc>>, mut visit: F)
    where
        F: FnMut(AppState, f64),
    {
        let (lower, upper) = (*range.start(), *range.end());
        for (index, current) in self.snapshots.iter().enumerate() {
            let next_date = self.snapshots.get(index + 1).map(|s| s.date);
            let start = current.date.max(lower);
            let end = match next_date {
                Some(next) => next.min(upper),
                None => upper,
            };
            if end > start {
                visit(current.state, crate::types::seconds_between(end, start));
            }
        }
    }
}
