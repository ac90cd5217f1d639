//! Error Analyzer
//!
//! Turns a captured [`ErrorEvent`] into an [`AnalyzedEvent`]: urgency,
//! a one-line summary, and an ordered list of suggested actions.
//!
//! Analysis is pure and total. Unknown error types fall back to the
//! generic classification instead of failing, so a captured error is never
//! dropped because of a classification gap.
//!
//! ## Urgency
//!
//! | severity | base urgency |
//! |----------|--------------|
//! | fatal    | critical     |
//! | error    | high         |
//! | warning  | medium       |
//! | info     | low          |
//!
//! Overflow and null-reference error types escalate one level (capped at
//! critical).

mod rules;

pub use rules::{normalize, ErrorCategory, GENERIC_ACTIONS};

use crate::event::{AnalyzedEvent, ContextValue, ErrorEvent, Urgency};

/// Context keys surfaced in the summary, in display order
const SUMMARY_CONTEXT_KEYS: &[(&str, &str)] = &[
    ("widgetPath", "widget"),
    ("routeName", "route"),
    ("stateName", "state"),
    ("apiEndpoint", "endpoint"),
    ("userAction", "user action"),
];

const TRIAGE_ACTION: &str = "Triage immediately: reproduce the failure and capture the full stack trace";
const STACK_TRACE_ACTION: &str = "Focus on the top frames of the attached stack trace";

/// Analyze a captured error
pub fn analyze(event: ErrorEvent) -> AnalyzedEvent {
    let category = ErrorCategory::classify(event.error_type());
    let urgency = urgency_for(&event);
    let summary = summarize(&event, category, urgency);
    let actions = suggested_actions(&event, category, urgency);

    AnalyzedEvent::new(event, summary, urgency, actions)
}

/// Severity table plus type-specific escalation
pub fn urgency_for(event: &ErrorEvent) -> Urgency {
    let base = Urgency::from_severity(event.severity());
    if rules::escalates(event.error_type()) {
        base.escalate()
    } else {
        base
    }
}

fn summarize(event: &ErrorEvent, category: ErrorCategory, urgency: Urgency) -> String {
    let mut summary = format!(
        "{} urgency {} error ({}): likely cause is {}.",
        capitalize(urgency.as_str()),
        event.error_type(),
        category.label(),
        category.likely_cause()
    );

    let located: Vec<String> = SUMMARY_CONTEXT_KEYS
        .iter()
        .filter_map(|(key, label)| match event.context().get(*key) {
            Some(ContextValue::Text(v)) if !v.is_empty() => Some(format!("{} {}", label, v)),
            Some(ContextValue::Number(n)) => Some(format!("{} {}", label, n)),
            _ => None,
        })
        .collect();

    if !located.is_empty() {
        summary.push_str(" Seen at ");
        summary.push_str(&located.join(", "));
        summary.push('.');
    }

    summary
}

fn suggested_actions(event: &ErrorEvent, category: ErrorCategory, urgency: Urgency) -> Vec<String> {
    let mut actions = Vec::with_capacity(category.actions().len() + 2);

    if urgency == Urgency::Critical {
        actions.push(TRIAGE_ACTION.to_string());
    }
    if event.stack_trace().is_some() {
        actions.push(STACK_TRACE_ACTION.to_string());
    }
    actions.extend(category.actions().iter().map(|a| a.to_string()));

    actions
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{RawError, Severity};

    fn event(error_type: &str, severity: Severity) -> ErrorEvent {
        ErrorEvent::capture(RawError::new(error_type, "something broke").severity(severity))
            .unwrap()
    }

    #[test]
    fn test_base_urgency_table() {
        assert_eq!(urgency_for(&event("ui", Severity::Info)), Urgency::Low);
        assert_eq!(urgency_for(&event("ui", Severity::Warning)), Urgency::Medium);
        assert_eq!(urgency_for(&event("ui", Severity::Error)), Urgency::High);
        assert_eq!(urgency_for(&event("ui", Severity::Fatal)), Urgency::Critical);
    }

    #[test]
    fn test_overflow_escalates() {
        assert_eq!(urgency_for(&event("overflow", Severity::Error)), Urgency::Critical);
        assert_eq!(urgency_for(&event("overflow", Severity::Info)), Urgency::Medium);
        assert_eq!(
            urgency_for(&event("null_reference", Severity::Fatal)),
            Urgency::Critical
        );
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let e = event("http_api", Severity::Warning);
        let a = analyze(e.clone());
        let b = analyze(e);
        assert_eq!(a, b);
        assert_eq!(a.urgency(), Urgency::Medium);
    }

    #[test]
    fn test_unknown_type_falls_back_to_generic() {
        let analyzed = analyze(event("quantum_flux", Severity::Error));
        let expected: Vec<String> = GENERIC_ACTIONS.iter().map(|a| a.to_string()).collect();
        assert_eq!(analyzed.suggested_actions(), expected.as_slice());
        assert!(analyzed.auto_analysis().contains("quantum_flux"));
    }

    #[test]
    fn test_critical_puts_triage_first() {
        let analyzed = analyze(event("overflow", Severity::Error));
        assert_eq!(analyzed.suggested_actions()[0], TRIAGE_ACTION);
        assert!(analyzed.auto_analysis().starts_with("Critical urgency"));
    }

    #[test]
    fn test_summary_includes_context_location() {
        let raw = RawError::new("widget_build", "bad state")
            .context("widgetPath", "/Home/Column")
            .context("retries", 2i64);
        let analyzed = analyze(ErrorEvent::capture(raw).unwrap());
        assert!(analyzed.auto_analysis().contains("widget /Home/Column"));
    }

    #[test]
    fn test_stack_trace_adds_action() {
        let raw = RawError::new("navigation", "no route").stack_trace("#0 main");
        let analyzed = analyze(ErrorEvent::capture(raw).unwrap());
        assert_eq!(analyzed.suggested_actions()[0], STACK_TRACE_ACTION);
    }

    #[test]
    fn test_analyzed_event_keeps_event_id() {
        let e = event("ui", Severity::Error);
        let id = e.id().to_string();
        assert_eq!(analyze(e).id(), id);
    }
}
