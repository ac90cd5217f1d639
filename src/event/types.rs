//! Core data types for captured runtime errors
//!
//! This module defines the fundamental types flowing through the pipeline:
//! - `RawError`: The payload a producer submits at capture time
//! - `ErrorEvent`: A validated, immutable captured error
//! - `AnalyzedEvent`: An `ErrorEvent` plus derived analysis fields
//! - `Severity` and `Urgency`: Classification enums

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

use super::error::{CaptureError, CaptureResult};

/// Maximum length of an error type string
pub const MAX_ERROR_TYPE_LEN: usize = 100;

/// Maximum length of an error message
pub const MAX_MESSAGE_LEN: usize = 10_000;

/// Maximum length of an attached stack trace
pub const MAX_STACK_TRACE_LEN: usize = 100_000;

/// Raw severity reported by the producer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    /// Get all severities for iteration
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Info,
            Severity::Warning,
            Severity::Error,
            Severity::Fatal,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Error
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            _ => Err(CaptureError::UnknownSeverity(s.to_string())),
        }
    }
}

/// Derived priority, distinct from the raw severity
///
/// Variants are declared in ascending order so `Ord` follows priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// Base urgency for a severity level
    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::Info => Urgency::Low,
            Severity::Warning => Urgency::Medium,
            Severity::Error => Urgency::High,
            Severity::Fatal => Urgency::Critical,
        }
    }

    /// One level up, capped at `Critical`
    pub fn escalate(self) -> Self {
        match self {
            Urgency::Low => Urgency::Medium,
            Urgency::Medium => Urgency::High,
            Urgency::High | Urgency::Critical => Urgency::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structured context value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ContextValue {
    Null,
    Number(f64),
    Text(String),
}

impl From<&str> for ContextValue {
    fn from(s: &str) -> Self {
        ContextValue::Text(s.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(s: String) -> Self {
        ContextValue::Text(s)
    }
}

impl From<f64> for ContextValue {
    fn from(n: f64) -> Self {
        ContextValue::Number(n)
    }
}

impl From<i64> for ContextValue {
    fn from(n: i64) -> Self {
        ContextValue::Number(n as f64)
    }
}

/// Structured context attached to an error (ordered for stable output)
pub type Context = BTreeMap<String, ContextValue>;

/// Error payload as submitted by a producer
///
/// Every field is optional on the wire so that missing required fields
/// surface as a descriptive `CaptureError` instead of a parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    /// RFC 3339 timestamp; defaults to the capture instant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl RawError {
    /// Create a raw error with the two required fields
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: Some(error_type.into()),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Builder method: set severity
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity.to_string());
        self
    }

    /// Builder method: set an explicit timestamp
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp.to_rfc3339());
        self
    }

    /// Builder method: add a context entry
    pub fn context(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.context
            .get_or_insert_with(Context::new)
            .insert(key.into(), value.into());
        self
    }

    /// Builder method: attach a stack trace
    pub fn stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }
}

/// A captured runtime error
///
/// Immutable once built; derived data lives in [`AnalyzedEvent`].
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEvent {
    id: String,
    captured_at: DateTime<Utc>,
    error_type: String,
    message: String,
    severity: Severity,
    context: Context,
    stack_trace: Option<String>,
}

impl ErrorEvent {
    /// Create an event with default severity and the current timestamp
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> CaptureResult<Self> {
        Self::capture(RawError::new(error_type, message))
    }

    /// Validate a raw payload and build an event from it
    pub fn capture(raw: RawError) -> CaptureResult<Self> {
        let error_type = required(raw.error_type, "errorType")?;
        let message = required(raw.message, "message")?;

        check_len("errorType", &error_type, MAX_ERROR_TYPE_LEN)?;
        check_len("message", &message, MAX_MESSAGE_LEN)?;
        if let Some(trace) = &raw.stack_trace {
            check_len("stackTrace", trace, MAX_STACK_TRACE_LEN)?;
        }

        let severity = match raw.severity.as_deref() {
            None => Severity::default(),
            Some(s) if s.trim().is_empty() => Severity::default(),
            Some(s) => s.parse()?,
        };

        let captured_at = match raw.timestamp.as_deref() {
            None => Utc::now(),
            Some(ts) => DateTime::parse_from_rfc3339(ts)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| CaptureError::InvalidTimestamp(ts.to_string()))?,
        };

        Ok(Self {
            id: generate_id(&captured_at),
            captured_at,
            error_type,
            message,
            severity,
            context: raw.context.unwrap_or_default(),
            stack_trace: raw.stack_trace.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn error_type(&self) -> &str {
        &self.error_type
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }
}

/// An error event plus its derived analysis
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedEvent {
    event: ErrorEvent,
    auto_analysis: String,
    urgency: Urgency,
    suggested_actions: Vec<String>,
}

impl AnalyzedEvent {
    pub(crate) fn new(
        event: ErrorEvent,
        auto_analysis: String,
        urgency: Urgency,
        suggested_actions: Vec<String>,
    ) -> Self {
        Self {
            event,
            auto_analysis,
            urgency,
            suggested_actions,
        }
    }

    /// The id of the underlying error event
    pub fn id(&self) -> &str {
        self.event.id()
    }

    pub fn event(&self) -> &ErrorEvent {
        &self.event
    }

    pub fn auto_analysis(&self) -> &str {
        &self.auto_analysis
    }

    pub fn urgency(&self) -> Urgency {
        self.urgency
    }

    pub fn suggested_actions(&self) -> &[String] {
        &self.suggested_actions
    }
}

fn required(value: Option<String>, field: &'static str) -> CaptureResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(CaptureError::MissingField(field)),
    }
}

fn check_len(field: &'static str, value: &str, max: usize) -> CaptureResult<()> {
    if value.chars().count() > max {
        return Err(CaptureError::TooLong { field, max });
    }
    Ok(())
}

/// `error_<millis>_<9 hex chars>`
fn generate_id(captured_at: &DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("error_{}_{}", captured_at.timestamp_millis(), &suffix[..9])
}
