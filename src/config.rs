//! Metrics configuration
//!
//! Thresholds for the time-based predicates and switches for the optional
//! metrics. Loadable from JSON; every field has a default.

use crate::error::MetricsError;
use crate::metrics::predicates::{
    DEFAULT_MAX_TIME_TO_NEXT_VIEW_SEC, DEFAULT_RESOURCE_THRESHOLD_SEC,
};
use serde::{Deserialize, Serialize};

/// Configuration of the view metrics processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Window after view start in which resources are initial (seconds)
    pub tns_resource_threshold_sec: f64,
    /// Maximum gap between last interaction and next view (seconds)
    pub inv_max_time_to_next_view_sec: f64,
    /// When false, INV is reported as `disabled`
    pub inv_enabled: bool,
    /// Compute TTNS and ITNV alongside TNS and INV
    pub legacy_metrics_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            tns_resource_threshold_sec: DEFAULT_RESOURCE_THRESHOLD_SEC,
            inv_max_time_to_next_view_sec: DEFAULT_MAX_TIME_TO_NEXT_VIEW_SEC,
            inv_enabled: true,
            legacy_metrics_enabled: true,
        }
    }
}

impl MetricsConfig {
    pub fn with_tns_threshold(mut self, seconds: f64) -> Self {
        self.tns_resource_threshold_sec = seconds;
        self
    }

    pub fn with_inv_max_time_to_next_view(mut self, seconds: f64) -> Self {
        self.inv_max_time_to_next_view_sec = seconds;
        self
    }

    pub fn with_inv_enabled(mut self, enabled: bool) -> Self {
        self.inv_enabled = enabled;
        self
    }

    pub fn with_legacy_metrics(mut self, enabled: bool) -> Self {
        self.legacy_metrics_enabled = enabled;
        self
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, MetricsError> {
        let config: MetricsConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, MetricsError> {
        serde_json::to_string_pretty(self).map_err(MetricsError::from)
    }

    /// Reject negative or non-finite thresholds
    pub fn validate(&self) -> Result<(), MetricsError> {
        let thresholds = [
            ("tns_resource_threshold_sec", self.tns_resource_threshold_sec),
            ("inv_max_time_to_next_view_sec", self.inv_max_time_to_next_view_sec),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(MetricsError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}
