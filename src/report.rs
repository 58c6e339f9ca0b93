//! Per-view metrics reports
//!
//! A report carries each metric either as a value (seconds and whole
//! nanoseconds) or as the typed reason it is missing, never both.

use crate::error::MetricsError;
use crate::metrics::{InvNoValueReason, PredicateKind, TnsNoValueReason};
use crate::types::{nanoseconds_to_seconds, seconds_to_nanoseconds, ViewId};
use crate::{PRODUCER_NAME, VIEWTIME_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A metric value or the reason it has none
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricOutcome<R> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_ns: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_value_reason: Option<R>,
}

pub type TnsOutcome = MetricOutcome<TnsNoValueReason>;
pub type InvOutcome = MetricOutcome<InvNoValueReason>;

impl<R> MetricOutcome<R> {
    pub fn value(seconds: f64) -> Self {
        Self {
            value_sec: Some(seconds),
            value_ns: seconds_to_nanoseconds(seconds),
            no_value_reason: None,
        }
    }

    /// Value supplied directly in nanoseconds
    pub fn value_ns(nanos: i64) -> Self {
        Self {
            value_sec: Some(nanoseconds_to_seconds(nanos)),
            value_ns: Some(nanos),
            no_value_reason: None,
        }
    }

    pub fn no_value(reason: R) -> Self {
        Self {
            value_sec: None,
            value_ns: None,
            no_value_reason: Some(reason),
        }
    }

    pub fn has_value(&self) -> bool {
        self.value_sec.is_some()
    }
}

impl<R> From<Result<f64, R>> for MetricOutcome<R> {
    fn from(result: Result<f64, R>) -> Self {
        match result {
            Ok(seconds) => Self::value(seconds),
            Err(reason) => Self::no_value(reason),
        }
    }
}

/// Library metadata embedded in every report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

impl ReportProducer {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            name: PRODUCER_NAME.to_string(),
            version: VIEWTIME_VERSION.to_string(),
            instance_id: instance_id.into(),
        }
    }
}

/// Metrics of a single view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewMetricsReport {
    pub view_id: ViewId,
    pub view_name: String,
    pub tns: TnsOutcome,
    pub inv: InvOutcome,
    /// Legacy TTNS, absent when disabled or unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttns_sec: Option<f64>,
    /// Legacy ITNV, absent when disabled or unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub itnv_sec: Option<f64>,
    pub tns_predicate: PredicateKind,
    pub inv_predicate: PredicateKind,
    pub computed_at: DateTime<Utc>,
    pub producer: ReportProducer,
}

impl ViewMetricsReport {
    pub fn to_json(&self) -> Result<String, MetricsError> {
        serde_json::to_string(self).map_err(|e| MetricsError::EncodingError(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, MetricsError> {
        serde_json::to_string_pretty(self).map_err(|e| MetricsError::EncodingError(e.to_string()))
    }
}

/// Encode reports as a JSON array
pub fn reports_to_json(reports: &[ViewMetricsReport], pretty: bool) -> Result<String, MetricsError> {
    let encoded = if pretty {
        serde_json::to_string_pretty(reports)
    } else {
        serde_json::to_string(reports)
    };
    encoded.map_err(|e| MetricsError::EncodingError(e.to_string()))
}
