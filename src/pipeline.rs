//! View metrics pipeline orchestration
//!
//! [`ViewMetricsProcessor`] is the single owner of every tracker of a session.
//! It routes recorded [`ViewEvent`]s to the per-view TNS/TTNS trackers and to
//! the session-wide INV/ITNV trackers, and emits a [`ViewMetricsReport`] when a
//! view stops. Since every call goes through `&mut self`, tracker calls are
//! serialized by construction.

use crate::app_state::AppStateHistory;
use crate::config::MetricsConfig;
use crate::error::MetricsError;
use crate::metrics::{
    InvMetric, InvNoValueReason, ItnvMetric, NetworkSettledResourcePredicate,
    NextViewActionPredicate, PredicateKind, TimeBasedActionPredicate, TimeBasedResourcePredicate,
    TnsMetric, TtnsMetric,
};
use crate::report::{reports_to_json, InvOutcome, ReportProducer, ViewMetricsReport};
use crate::schema::{parse_events, validate_events, ViewEvent};
use crate::types::ViewId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Replay a recorded session (NDJSON or JSON array) and return the reports
/// as a JSON array (stateless, one-shot).
///
/// # Example
/// ```ignore
/// let reports_json = replay_to_json(&events, &MetricsConfig::default())?;
/// ```
pub fn replay_to_json(input: &str, config: &MetricsConfig) -> Result<String, MetricsError> {
    let reports = replay(input, config)?;
    reports_to_json(&reports, false)
}

/// Replay a recorded session and return the emitted reports in order
pub fn replay(input: &str, config: &MetricsConfig) -> Result<Vec<ViewMetricsReport>, MetricsError> {
    let events = parse_events(input)?;
    validate_events(&events)?;

    let mut processor = ViewMetricsProcessor::with_config(config.clone())?;
    Ok(processor.process_all(events))
}

/// Trackers and bookkeeping of a view that has not completed yet
struct LiveView {
    name: String,
    tns: TnsMetric,
    ttns: Option<TtnsMetric>,
    custom_inv_ns: Option<i64>,
    is_stopped: bool,
}

/// Stateful processor owning all trackers of one session
pub struct ViewMetricsProcessor {
    config: MetricsConfig,
    tns_predicate: Arc<dyn NetworkSettledResourcePredicate>,
    tns_predicate_kind: PredicateKind,
    inv_predicate_kind: PredicateKind,
    views: HashMap<ViewId, LiveView>,
    inv: InvMetric,
    itnv: Option<ItnvMetric>,
    /// Created on the first view start or app state event
    app_state_history: Option<AppStateHistory>,
    producer: ReportProducer,
}

impl Default for ViewMetricsProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewMetricsProcessor {
    /// Create a processor with the default configuration
    pub fn new() -> Self {
        Self::from_valid_config(MetricsConfig::default())
    }

    /// Create a processor with a specific configuration
    pub fn with_config(config: MetricsConfig) -> Result<Self, MetricsError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: MetricsConfig) -> Self {
        let tns_predicate = Arc::new(TimeBasedResourcePredicate::new(config.tns_resource_threshold_sec));
        let inv_predicate = Arc::new(TimeBasedActionPredicate::new(config.inv_max_time_to_next_view_sec));
        let itnv = config.legacy_metrics_enabled.then(ItnvMetric::new);

        Self {
            tns_predicate,
            tns_predicate_kind: PredicateKind::TimeBased,
            inv_predicate_kind: PredicateKind::TimeBased,
            views: HashMap::new(),
            inv: InvMetric::new(inv_predicate),
            itnv,
            app_state_history: None,
            producer: ReportProducer::new(Uuid::new_v4().to_string()),
            config,
        }
    }

    /// Classify initial resources with a custom predicate.
    ///
    /// Applies to views started after the call.
    pub fn with_tns_predicate(mut self, predicate: Arc<dyn NetworkSettledResourcePredicate>) -> Self {
        self.tns_predicate = predicate;
        self.tns_predicate_kind = PredicateKind::Custom;
        self
    }

    /// Select the last interaction with a custom predicate.
    ///
    /// Resets the INV tracker, so call it before processing events.
    pub fn with_inv_predicate(mut self, predicate: Arc<dyn NextViewActionPredicate>) -> Self {
        self.inv = InvMetric::new(predicate);
        self.inv_predicate_kind = PredicateKind::Custom;
        self
    }

    /// Start from a known app state history instead of assuming the app was
    /// active when the first view started
    pub fn with_app_state_history(mut self, history: AppStateHistory) -> Self {
        self.app_state_history = Some(history);
        self
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.producer = ReportProducer::new(instance_id);
        self
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    pub fn app_state_history(&self) -> Option<&AppStateHistory> {
        self.app_state_history.as_ref()
    }

    /// Number of views started but not completed
    pub fn live_view_count(&self) -> usize {
        self.views.len()
    }

    /// Supply an externally computed INV for a view, reported when INV is disabled
    pub fn set_custom_inv(&mut self, view_id: ViewId, value_ns: i64) {
        match self.views.get_mut(&view_id) {
            Some(view) => view.custom_inv_ns = Some(value_ns),
            None => debug!(%view_id, "custom INV for unknown view ignored"),
        }
    }

    /// Route one event to the trackers. Returns the view's report when the
    /// event stops a view.
    pub fn process(&mut self, event: ViewEvent) -> Option<ViewMetricsReport> {
        trace!(kind = event.kind(), "processing event");

        if let Some(view_id) = event.view_id() {
            let is_view_start = matches!(event, ViewEvent::ViewStart { .. });
            if !is_view_start && !self.views.contains_key(&view_id) {
                debug!(%view_id, kind = event.kind(), "event for unknown view ignored");
                return None;
            }
        }

        match event {
            ViewEvent::ViewStart { view_id, name, time } => {
                self.start_view(view_id, name, time);
                None
            }
            ViewEvent::ViewStop { view_id, time } => self.stop_view(view_id, time),
            ViewEvent::ViewComplete { view_id } => {
                self.inv.track_view_complete(view_id);
                if let Some(itnv) = self.itnv.as_mut() {
                    itnv.track_view_complete(view_id);
                }
                self.views.remove(&view_id);
                debug!(%view_id, live_views = self.views.len(), "view completed");
                None
            }
            ViewEvent::Action {
                view_id,
                action_type,
                name,
                start_time,
                end_time,
            } => {
                self.inv.track_action(start_time, end_time, &name, action_type, view_id);
                if let Some(itnv) = self.itnv.as_mut() {
                    itnv.track_action(start_time, end_time, action_type, view_id);
                }
                None
            }
            ViewEvent::ResourceStart {
                view_id,
                resource_id,
                url,
                time,
            } => {
                if let Some(view) = self.views.get_mut(&view_id) {
                    view.tns.track_resource_start(time, resource_id, &url);
                    if let Some(ttns) = view.ttns.as_mut() {
                        ttns.track_resource_start(time, resource_id, &url);
                    }
                }
                None
            }
            ViewEvent::ResourceEnd {
                view_id,
                resource_id,
                time,
                duration,
            } => {
                if let Some(view) = self.views.get_mut(&view_id) {
                    view.tns.track_resource_end(time, resource_id, duration);
                    if let Some(ttns) = view.ttns.as_mut() {
                        ttns.track_resource_end(time, resource_id, duration);
                    }
                }
                None
            }
            ViewEvent::ResourceDropped { view_id, resource_id } => {
                if let Some(view) = self.views.get_mut(&view_id) {
                    view.tns.track_resource_dropped(resource_id);
                    if let Some(ttns) = view.ttns.as_mut() {
                        ttns.track_resource_dropped(resource_id);
                    }
                }
                None
            }
            ViewEvent::AppStateChanged { state, time } => {
                match self.app_state_history.as_mut() {
                    Some(history) => history.append(state, time),
                    None => self.app_state_history = Some(AppStateHistory::new(state, time)),
                }
                None
            }
            ViewEvent::CustomInv { view_id, value_ns } => {
                self.set_custom_inv(view_id, value_ns);
                None
            }
        }
    }

    /// Process events in order and collect the emitted reports
    pub fn process_all<I>(&mut self, events: I) -> Vec<ViewMetricsReport>
    where
        I: IntoIterator<Item = ViewEvent>,
    {
        events.into_iter().filter_map(|event| self.process(event)).collect()
    }

    /// Current metrics of a live view as of `now`, without stopping it
    pub fn report_for(&mut self, view_id: ViewId, now: DateTime<Utc>) -> Option<ViewMetricsReport> {
        self.build_report(view_id, now)
    }

    fn start_view(&mut self, view_id: ViewId, name: String, time: DateTime<Utc>) {
        if self.views.contains_key(&view_id) {
            warn!(%view_id, "duplicate view start ignored");
            return;
        }
        if self.app_state_history.is_none() {
            self.app_state_history = Some(AppStateHistory::active_since(time));
        }

        self.inv.track_view_start(time, &name, view_id);
        if let Some(itnv) = self.itnv.as_mut() {
            itnv.track_view_start(time, view_id);
        }

        let ttns = self
            .config
            .legacy_metrics_enabled
            .then(|| TtnsMetric::new(name.clone(), time));
        let tns = TnsMetric::new(name.clone(), time, Arc::clone(&self.tns_predicate));
        debug!(%view_id, view_name = %name, "view started");

        self.views.insert(
            view_id,
            LiveView {
                name,
                tns,
                ttns,
                custom_inv_ns: None,
                is_stopped: false,
            },
        );
    }

    fn stop_view(&mut self, view_id: ViewId, time: DateTime<Utc>) -> Option<ViewMetricsReport> {
        let view = self.views.get_mut(&view_id)?;
        if view.is_stopped {
            debug!(%view_id, "view already stopped");
            return None;
        }
        view.is_stopped = true;
        view.tns.track_view_was_stopped();
        if let Some(ttns) = view.ttns.as_mut() {
            ttns.track_view_was_stopped();
        }

        let report = self.build_report(view_id, time);
        if let Some(report) = &report {
            debug!(
                %view_id,
                tns = ?report.tns.value_sec,
                inv = ?report.inv.value_sec,
                "view stopped, metrics reported"
            );
        }
        report
    }

    fn build_report(&mut self, view_id: ViewId, now: DateTime<Utc>) -> Option<ViewMetricsReport> {
        let view = self.views.get_mut(&view_id)?;

        let fallback;
        let history = match &self.app_state_history {
            Some(history) => history,
            None => {
                fallback = AppStateHistory::active_since(view.tns.view_start());
                &fallback
            }
        };

        let tns = view.tns.value(history).into();
        let ttns_sec = view.ttns.as_mut().and_then(|ttns| ttns.value(now, history));

        let inv = if self.config.inv_enabled {
            self.inv.value(view_id).into()
        } else {
            match view.custom_inv_ns {
                Some(nanos) => InvOutcome::value_ns(nanos),
                None => InvOutcome::no_value(InvNoValueReason::Disabled),
            }
        };
        let itnv_sec = self.itnv.as_ref().and_then(|itnv| itnv.value(view_id));

        Some(ViewMetricsReport {
            view_id,
            view_name: view.name.clone(),
            tns,
            inv,
            ttns_sec,
            itnv_sec,
            tns_predicate: self.tns_predicate_kind,
            inv_predicate: self.inv_predicate_kind,
            computed_at: now,
            producer: self.producer.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppState;
    use crate::metrics::{ActionParams, ResourceParams, TnsNoValueReason};
    use crate::types::{add_seconds, ActionType, ResourceId};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn at(offset: f64) -> DateTime<Utc> {
        add_seconds(Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap(), offset).unwrap()
    }

    fn assert_approx(value: Option<f64>, expected: f64) {
        let value = value.unwrap_or_else(|| panic!("expected {expected}, got None"));
        assert!((value - expected).abs() < 0.01, "expected {expected}, got {value}");
    }

    fn view_start(view_id: ViewId, name: &str, offset: f64) -> ViewEvent {
        ViewEvent::ViewStart {
            view_id,
            name: name.to_string(),
            time: at(offset),
        }
    }

    fn view_stop(view_id: ViewId, offset: f64) -> ViewEvent {
        ViewEvent::ViewStop {
            view_id,
            time: at(offset),
        }
    }

    fn resource(view_id: ViewId, resource_id: ResourceId, start: f64, end: f64) -> [ViewEvent; 2] {
        [
            ViewEvent::ResourceStart {
                view_id,
                resource_id,
                url: "https://api.example.com/feed".to_string(),
                time: at(start),
            },
            ViewEvent::ResourceEnd {
                view_id,
                resource_id,
                time: at(end),
                duration: None,
            },
        ]
    }

    fn action(view_id: ViewId, action_type: ActionType, start: f64, end: f64) -> ViewEvent {
        ViewEvent::Action {
            view_id,
            action_type,
            name: "button".to_string(),
            start_time: at(start),
            end_time: at(end),
        }
    }

    #[test]
    fn test_single_wave_report_on_stop() {
        let view = ViewId::new_random();
        let mut processor = ViewMetricsProcessor::new();

        let mut events = vec![view_start(view, "Home", 0.0)];
        events.extend(resource(view, ResourceId::new_random(), 0.02, 0.05));
        events.push(view_stop(view, 2.0));

        let reports = processor.process_all(events);
        assert_eq!(reports.len(), 1);

        let report = &reports[0];
        assert_eq!(report.view_name, "Home");
        assert_approx(report.tns.value_sec, 0.05);
        assert_approx(report.ttns_sec, 0.05);
        assert_eq!(report.inv.no_value_reason, Some(InvNoValueReason::NoPrecedingView));
        assert_eq!(report.computed_at, at(2.0));
    }

    #[test]
    fn test_multi_wave_value_while_second_wave_pending() {
        let view = ViewId::new_random();
        let config = MetricsConfig::default().with_tns_threshold(1.0);
        let mut processor = ViewMetricsProcessor::with_config(config).unwrap();
        let (a, b) = (ResourceId::new_random(), ResourceId::new_random());

        processor.process(view_start(view, "Feed", 0.0));
        for event in resource(view, a, 0.0, 0.2) {
            processor.process(event);
        }
        let [b_start, b_end] = resource(view, b, 0.3, 0.5);
        processor.process(b_start);

        let report = processor.report_for(view, at(0.4)).unwrap();
        assert_approx(report.tns.value_sec, 0.2);

        processor.process(b_end);
        let report = processor.report_for(view, at(0.6)).unwrap();
        assert_approx(report.tns.value_sec, 0.5);
    }

    #[test]
    fn test_inv_uses_most_recent_eligible_action() {
        let (previous, next) = (ViewId::new_random(), ViewId::new_random());
        let mut processor = ViewMetricsProcessor::new();

        let reports = processor.process_all(vec![
            view_start(previous, "List", 0.0),
            action(previous, ActionType::Tap, 1.0, 1.0),
            action(previous, ActionType::Swipe, 1.5, 2.0),
            view_stop(previous, 2.5),
            view_start(next, "Detail", 2.5),
            view_stop(next, 4.0),
        ]);

        assert_eq!(reports.len(), 2);
        assert_approx(reports[1].inv.value_sec, 0.5);
        assert_approx(reports[1].itnv_sec, 0.5);
    }

    #[test]
    fn test_background_interrupts_tns() {
        let view = ViewId::new_random();
        let mut processor = ViewMetricsProcessor::new();

        let mut events = vec![view_start(view, "Home", 0.0)];
        let [start, end] = resource(view, ResourceId::new_random(), 0.0, 3.0);
        events.push(start);
        events.push(ViewEvent::AppStateChanged {
            state: AppState::Background,
            time: at(1.0),
        });
        events.push(ViewEvent::AppStateChanged {
            state: AppState::Active,
            time: at(2.0),
        });
        events.push(end);
        events.push(view_stop(view, 5.0));

        let reports = processor.process_all(events);
        assert_eq!(reports[0].tns.no_value_reason, Some(TnsNoValueReason::AppNotInForeground));
        assert_eq!(reports[0].ttns_sec, None);
    }

    #[test]
    fn test_stop_before_settled() {
        let view = ViewId::new_random();
        let mut processor = ViewMetricsProcessor::new();

        processor.process(view_start(view, "Home", 0.0));
        processor.process(ViewEvent::ResourceStart {
            view_id: view,
            resource_id: ResourceId::new_random(),
            url: "https://cdn.example.com/hero.png".to_string(),
            time: at(0.01),
        });
        let report = processor.process(view_stop(view, 1.0)).unwrap();

        assert_eq!(
            report.tns.no_value_reason,
            Some(TnsNoValueReason::ViewStoppedBeforeSettled)
        );
        assert!(processor.process(view_stop(view, 1.5)).is_none());
    }

    #[test]
    fn test_infinite_duration_reports_a_reason() {
        let view = ViewId::new_random();
        let resource_id = ResourceId::new_random();
        let mut processor = ViewMetricsProcessor::new();

        let reports = processor.process_all(vec![
            view_start(view, "Home", 0.0),
            ViewEvent::ResourceStart {
                view_id: view,
                resource_id,
                url: "https://api.example.com/feed".to_string(),
                time: at(0.01),
            },
            ViewEvent::ResourceEnd {
                view_id: view,
                resource_id,
                time: at(0.05),
                duration: Some(f64::INFINITY),
            },
            view_stop(view, 1.0),
        ]);

        let tns = &reports[0].tns;
        assert_eq!(tns.value_sec, None);
        assert_eq!(tns.value_ns, None);
        assert_eq!(tns.no_value_reason, Some(TnsNoValueReason::InitialResourcesInvalid));
        assert_eq!(reports[0].ttns_sec, None);
    }

    #[test]
    fn test_unknown_views_are_ignored() {
        let (view, stranger) = (ViewId::new_random(), ViewId::new_random());
        let mut processor = ViewMetricsProcessor::new();

        processor.process(view_start(view, "Home", 0.0));
        for event in resource(stranger, ResourceId::new_random(), 0.0, 0.05) {
            assert!(processor.process(event).is_none());
        }
        assert!(processor.process(action(stranger, ActionType::Tap, 0.5, 0.5)).is_none());
        assert!(processor.process(view_stop(stranger, 1.0)).is_none());

        let report = processor.process(view_stop(view, 1.0)).unwrap();
        assert_eq!(report.tns.no_value_reason, Some(TnsNoValueReason::NoTrackedResources));
    }

    #[test]
    fn test_view_complete_evicts_previous_view() {
        let (first, second, third) = (ViewId::new_random(), ViewId::new_random(), ViewId::new_random());
        let mut processor = ViewMetricsProcessor::new();

        processor.process_all(vec![
            view_start(first, "A", 0.0),
            action(first, ActionType::Tap, 1.0, 1.0),
            view_stop(first, 1.5),
            view_start(second, "B", 1.5),
        ]);
        assert_approx(processor.report_for(second, at(2.0)).unwrap().inv.value_sec, 0.5);

        processor.process(ViewEvent::ViewComplete { view_id: first });
        assert_eq!(processor.live_view_count(), 1);
        processor.process(ViewEvent::ViewComplete { view_id: second });
        assert_eq!(processor.live_view_count(), 0);
        assert!(processor.report_for(second, at(2.0)).is_none());

        // Events for completed views are dropped
        assert!(processor.process(action(first, ActionType::Tap, 2.0, 2.0)).is_none());

        // The completed view still anchors INV for the view that follows it
        processor.process(view_start(third, "C", 3.0));
        let report = processor.report_for(third, at(3.5)).unwrap();
        assert_eq!(report.inv.no_value_reason, Some(InvNoValueReason::NoTrackedActions));
    }

    #[test]
    fn test_disabled_inv_and_custom_value() {
        let (first, second) = (ViewId::new_random(), ViewId::new_random());
        let config = MetricsConfig::default()
            .with_inv_enabled(false)
            .with_legacy_metrics(false);
        let mut processor = ViewMetricsProcessor::with_config(config).unwrap();

        let reports = processor.process_all(vec![
            view_start(first, "A", 0.0),
            action(first, ActionType::Tap, 1.0, 1.0),
            view_stop(first, 1.5),
            view_start(second, "B", 1.5),
            ViewEvent::CustomInv {
                view_id: second,
                value_ns: 750_000_000,
            },
            view_stop(second, 3.0),
        ]);

        assert_eq!(reports[0].inv.no_value_reason, Some(InvNoValueReason::Disabled));
        assert_eq!(reports[1].inv.value_ns, Some(750_000_000));
        assert_eq!(reports[1].itnv_sec, None);
        assert_eq!(reports[1].ttns_sec, None);
    }

    #[test]
    fn test_custom_predicates() {
        let (first, second) = (ViewId::new_random(), ViewId::new_random());
        let mut processor = ViewMetricsProcessor::new()
            .with_tns_predicate(Arc::new(|params: &ResourceParams| params.url.contains("api.example.com")))
            .with_inv_predicate(Arc::new(|params: &ActionParams| params.name == "buy"));

        let mut events = vec![view_start(first, "Shop", 0.0)];
        events.extend(resource(first, ResourceId::new_random(), 0.5, 0.8));
        events.push(ViewEvent::Action {
            view_id: first,
            action_type: ActionType::Scroll,
            name: "buy".to_string(),
            start_time: at(1.0),
            end_time: at(1.2),
        });
        events.push(view_stop(first, 2.0));
        events.push(view_start(second, "Cart", 2.0));
        events.push(view_stop(second, 3.0));

        let reports = processor.process_all(events);
        assert_eq!(reports[0].tns_predicate, PredicateKind::Custom);
        assert_approx(reports[0].tns.value_sec, 0.8);
        assert_approx(reports[1].inv.value_sec, 0.8);
        assert_eq!(reports[1].inv_predicate, PredicateKind::Custom);
    }

    #[test]
    fn test_replay_ndjson() {
        let view = ViewId::new_random();
        let resource_id = ResourceId::new_random();
        let mut events = vec![view_start(view, "Home", 0.0)];
        events.extend(resource(view, resource_id, 0.0, 0.25));
        events.push(view_stop(view, 1.0));

        let input = events
            .iter()
            .map(|event| serde_json::to_string(event).unwrap())
            .collect::<Vec<_>>()
            .join("\n");

        let json = replay_to_json(&input, &MetricsConfig::default()).unwrap();
        let reports: Vec<ViewMetricsReport> = serde_json::from_str(&json).unwrap();
        assert_eq!(reports.len(), 1);
        assert_approx(reports[0].tns.value_sec, 0.25);
    }

    #[test]
    fn test_replay_rejects_invalid_input() {
        let config = MetricsConfig::default();
        assert!(matches!(
            replay(r#"[{"type":"view_start","view_id":"x"}]"#, &config),
            Err(MetricsError::InvalidEvent { index: 0, .. })
        ));

        let bad_config = MetricsConfig::default().with_tns_threshold(-1.0);
        assert!(matches!(
            replay("", &bad_config),
            Err(MetricsError::InvalidConfig(_))
        ));
    }

    /// Identifiers shared by the noise-free and noisy runs of one session
    #[derive(Clone, Copy)]
    struct Session {
        finished: ViewId,
        first: ViewId,
        second: ViewId,
        first_resource: ResourceId,
        second_resource: ResourceId,
    }

    impl Session {
        fn new() -> Self {
            Self {
                finished: ViewId::new_random(),
                first: ViewId::new_random(),
                second: ViewId::new_random(),
                first_resource: ResourceId::new_random(),
                second_resource: ResourceId::new_random(),
            }
        }

        /// A view that starts, stops and completes before the session proper
        fn prelude(&self) -> Vec<ViewEvent> {
            vec![
                view_start(self.finished, "Splash", 0.0),
                view_stop(self.finished, 0.5),
                ViewEvent::ViewComplete { view_id: self.finished },
            ]
        }

        /// Two consecutive views, each loading one resource
        fn body(&self) -> Vec<ViewEvent> {
            let mut events = vec![view_start(self.first, "List", 1.0)];
            events.extend(resource(self.first, self.first_resource, 1.02, 1.3));
            events.push(action(self.first, ActionType::Tap, 2.0, 2.0));
            events.push(view_stop(self.first, 2.5));
            events.push(view_start(self.second, "Detail", 2.5));
            events.extend(resource(self.second, self.second_resource, 2.51, 2.9));
            events.push(view_stop(self.second, 4.0));
            events
        }

        /// An event that refers to an unknown or completed view, or to a
        /// resource the receiving view never started
        fn noise(&self, kind: usize, offset: f64) -> ViewEvent {
            let stranger = ViewId::new_random();
            let ghost = ResourceId::new_random();
            match kind {
                0 => ViewEvent::ResourceStart {
                    view_id: stranger,
                    resource_id: ghost,
                    url: "https://api.example.com/feed".to_string(),
                    time: at(offset),
                },
                1 => ViewEvent::ResourceEnd {
                    view_id: stranger,
                    resource_id: ghost,
                    time: at(offset),
                    duration: None,
                },
                2 => action(stranger, ActionType::Tap, offset, offset),
                3 => view_stop(stranger, offset),
                4 => ViewEvent::ViewComplete { view_id: stranger },
                5 => action(self.finished, ActionType::Click, offset, offset),
                6 => ViewEvent::ResourceStart {
                    view_id: self.finished,
                    resource_id: ghost,
                    url: "https://api.example.com/feed".to_string(),
                    time: at(offset),
                },
                7 => ViewEvent::ResourceEnd {
                    view_id: self.first,
                    resource_id: ghost,
                    time: at(offset),
                    duration: None,
                },
                8 => ViewEvent::ResourceDropped {
                    view_id: self.second,
                    resource_id: ghost,
                },
                9 => ViewEvent::ResourceEnd {
                    view_id: self.second,
                    resource_id: self.first_resource,
                    time: at(offset),
                    duration: None,
                },
                10 => ViewEvent::ResourceDropped {
                    view_id: self.first,
                    resource_id: self.second_resource,
                },
                _ => ViewEvent::CustomInv {
                    view_id: stranger,
                    value_ns: 1_000_000,
                },
            }
        }
    }

    proptest! {
        /// Events for unknown or completed views and resources never change any report.
        #[test]
        fn unknown_identifiers_never_change_reports(
            noise in proptest::collection::vec((any::<usize>(), 0usize..12, 0.0f64..10.0), 0..40),
        ) {
            let session = Session::new();

            let mut reference = ViewMetricsProcessor::new().with_instance_id("session");
            reference.process_all(session.prelude());
            let expected = reference.process_all(session.body());

            let mut body = session.body();
            for (position, kind, offset) in noise {
                let index = position % (body.len() + 1);
                body.insert(index, session.noise(kind, offset));
            }
            let mut noisy = ViewMetricsProcessor::new().with_instance_id("session");
            noisy.process_all(session.prelude());
            let actual = noisy.process_all(body);

            prop_assert_eq!(expected.len(), 2);
            prop_assert_eq!(&expected, &actual);
        }
    }
}
