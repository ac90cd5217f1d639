//! Error Event Model
//!
//! Canonical representation of a captured runtime error.
//!
//! ## Architecture
//!
//! - **RawError**: What a producer submits (all fields optional on the wire)
//! - **ErrorEvent**: Validated, immutable capture with id and timestamp
//! - **AnalyzedEvent**: Event plus urgency, summary and suggested actions
//!
//! Events are never edited after capture. Anything derived from an event is
//! produced as a new [`AnalyzedEvent`] by the [`analyzer`](crate::analyzer).

mod error;
mod types;

pub use error::{CaptureError, CaptureResult};
pub use types::{
    AnalyzedEvent, Context, ContextValue, ErrorEvent, RawError, Severity, Urgency,
    MAX_ERROR_TYPE_LEN, MAX_MESSAGE_LEN, MAX_STACK_TRACE_LEN,
};
