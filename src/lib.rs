//! Viewtime - view-timing metrics engine for client-side performance monitoring
//!
//! Viewtime computes per-view timing metrics from asynchronously arriving
//! action and resource events:
//!
//! - **TNS** (Time-to-Network-Settled): time from view start until its initial
//!   resources finished loading, across one or more settling waves
//! - **INV** (Interaction-to-Next-View): time from the last qualifying user
//!   action in the previous view until the next view started
//! - **TTNS** and **ITNV**: their single-wave and last-action-only legacy variants
//!
//! A metric that cannot be computed reports a typed reason instead of a value.
//!
//! ## Modules
//!
//! - **Trackers** ([`metrics`]): pure state machines and classification predicates
//! - **Pipeline** ([`pipeline`]): replays recorded [`ViewEvent`]s and emits
//!   [`ViewMetricsReport`]s

pub mod app_state;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use app_state::{AppState, AppStateHistory};
pub use config::MetricsConfig;
pub use error::MetricsError;
pub use metrics::{
    InvMetric, InvNoValueReason, ItnvMetric, NetworkSettledTracking, NextViewTracking, TnsMetric,
    TnsNoValueReason, TtnsMetric,
};
pub use pipeline::{replay, replay_to_json, ViewMetricsProcessor};
pub use report::{MetricOutcome, ViewMetricsReport};
pub use schema::{ViewEvent, SCHEMA_VERSION};
pub use types::{ActionType, ResourceId, ViewId};

/// Viewtime version embedded in all reports
pub const VIEWTIME_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "viewtime";
