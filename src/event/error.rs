//! Capture error types
//!
//! Errors raised when a raw error payload is rejected at ingress.

use thiserror::Error;

/// Errors that can occur while capturing an error event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// A required field was missing or blank
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Severity string did not name a known level
    #[error("Unknown severity '{0}' (expected info, warning, error or fatal)")]
    UnknownSeverity(String),

    /// A field exceeded its length limit
    #[error("Field '{field}' exceeds maximum length of {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// Timestamp could not be parsed as RFC 3339
    #[error("Invalid timestamp '{0}': expected RFC 3339")]
    InvalidTimestamp(String),
}

/// Result type alias for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;
