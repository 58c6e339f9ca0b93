//! Error types for Viewtime
//!
//! Trackers never fail: a missing metric is reported through its typed
//! no-value reason. These errors only cover the boundaries (event parsing,
//! configuration, encoding).

use thiserror::Error;

/// Errors raised at the crate boundaries
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid event at index {index}: {reason}")]
    InvalidEvent { index: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
