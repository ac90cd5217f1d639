//! Classification tables
//!
//! Maps free-form error type strings onto a small set of known categories,
//! each carrying a likely-cause line and an ordered list of actions.

use regex::Regex;
use std::sync::OnceLock;

/// Known error families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    WidgetBuild,
    StateManagement,
    Navigation,
    HttpApi,
    PlatformChannel,
    MemoryPerformance,
    Overflow,
    NullReference,
    Framework,
    General,
}

impl ErrorCategory {
    /// Classify a raw error type. Never fails: unknown types are `General`.
    pub fn classify(error_type: &str) -> Self {
        let key = normalize(error_type);

        match key.as_str() {
            "widget_build" | "build" | "ui" | "render" | "layout" => {
                return ErrorCategory::WidgetBuild
            }
            "state_management" | "state" | "bloc" | "provider" => {
                return ErrorCategory::StateManagement
            }
            "navigation" | "route" | "routing" => return ErrorCategory::Navigation,
            "http_api" | "http" | "network" | "api" | "timeout" => return ErrorCategory::HttpApi,
            "platform_channel" | "platform" | "plugin" => return ErrorCategory::PlatformChannel,
            "memory_performance" | "memory" | "performance" | "jank" => {
                return ErrorCategory::MemoryPerformance
            }
            "framework" | "flutter" => return ErrorCategory::Framework,
            "general" | "exception" | "error" => return ErrorCategory::General,
            _ => {}
        }

        if is_overflow(error_type) {
            ErrorCategory::Overflow
        } else if is_null_reference(error_type) {
            ErrorCategory::NullReference
        } else if key.contains("widget") || key.contains("render") {
            ErrorCategory::WidgetBuild
        } else if key.contains("state") {
            ErrorCategory::StateManagement
        } else if key.contains("navig") || key.contains("route") {
            ErrorCategory::Navigation
        } else if key.contains("http") || key.contains("network") || key.contains("socket") {
            ErrorCategory::HttpApi
        } else if key.contains("channel") || key.contains("platform") {
            ErrorCategory::PlatformChannel
        } else if key.contains("memory") || key.contains("leak") {
            ErrorCategory::MemoryPerformance
        } else {
            ErrorCategory::General
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::WidgetBuild => "widget build",
            ErrorCategory::StateManagement => "state management",
            ErrorCategory::Navigation => "navigation",
            ErrorCategory::HttpApi => "network/API",
            ErrorCategory::PlatformChannel => "platform channel",
            ErrorCategory::MemoryPerformance => "memory/performance",
            ErrorCategory::Overflow => "layout overflow",
            ErrorCategory::NullReference => "null reference",
            ErrorCategory::Framework => "framework",
            ErrorCategory::General => "general",
        }
    }

    pub fn likely_cause(&self) -> &'static str {
        match self {
            ErrorCategory::WidgetBuild => {
                "a widget build method threw, often from null properties or uninitialized state"
            }
            ErrorCategory::StateManagement => {
                "state was emitted or read outside its lifecycle, or a provider scope is missing"
            }
            ErrorCategory::Navigation => {
                "the navigation stack received an invalid route or a disposed navigator context"
            }
            ErrorCategory::HttpApi => {
                "a network request failed through connectivity, authentication or response parsing"
            }
            ErrorCategory::PlatformChannel => {
                "a platform channel call had no native handler or returned an unexpected type"
            }
            ErrorCategory::MemoryPerformance => {
                "resources are retained past their lifetime or work is blocking the UI thread"
            }
            ErrorCategory::Overflow => {
                "content exceeds the space its parent provides or a numeric bound was crossed"
            }
            ErrorCategory::NullReference => {
                "a value was dereferenced before it was initialized or after it was cleared"
            }
            ErrorCategory::Framework => {
                "the framework rejected an operation, usually from an invalid lifecycle call"
            }
            ErrorCategory::General => "no specific pattern matched this error type",
        }
    }

    /// Ordered remediation steps for this category
    pub fn actions(&self) -> &'static [&'static str] {
        match self {
            ErrorCategory::WidgetBuild => &[
                "Add null checks for widget properties used in build()",
                "Initialize state before the first build",
                "Move async work out of build() into FutureBuilder or StreamBuilder",
                "Inspect the widget tree with the widget inspector",
            ],
            ErrorCategory::StateManagement => &[
                "Log every state transition leading up to the error",
                "Verify provider or bloc scope covers the failing widget",
                "Wrap state emissions in error handling and emit an error state",
                "Check for races between concurrent state updates",
            ],
            ErrorCategory::Navigation => &[
                "Confirm the route name is registered in the route table",
                "Check the navigator context is still mounted before pushing",
                "Look for duplicate pushes without a matching pop",
            ],
            ErrorCategory::HttpApi => &[
                "Reproduce the request against the endpoint with curl",
                "Check connectivity, headers and authentication",
                "Validate the response body before parsing",
                "Add retry with exponential backoff for transient failures",
            ],
            ErrorCategory::PlatformChannel => &[
                "Verify the native handler is registered for the channel name",
                "Check argument and return types match on both sides",
                "Test on every target platform",
            ],
            ErrorCategory::MemoryPerformance => &[
                "Profile memory and frame timings with the performance tools",
                "Dispose controllers, streams and listeners in dispose()",
                "Move heavy computation off the UI thread",
            ],
            ErrorCategory::Overflow => &[
                "Wrap the overflowing child in Expanded or Flexible",
                "Constrain unbounded content or make it scrollable",
                "Check the layout on the smallest supported screen size",
            ],
            ErrorCategory::NullReference => &[
                "Find the first frame where the value becomes null",
                "Replace force unwraps with explicit null handling",
                "Ensure initialization completes before first use",
            ],
            ErrorCategory::Framework => &[
                "Check the framework version against known issues",
                "Verify lifecycle methods are called in the documented order",
                "Run the static analyzer for misuse warnings",
            ],
            ErrorCategory::General => GENERIC_ACTIONS,
        }
    }
}

/// Fallback actions when no specific entry exists
pub const GENERIC_ACTIONS: &[&str] = &[
    "Read the full error message and stack trace",
    "Reproduce the error consistently in a minimal case",
    "Add logging around the failing code path",
    "Test in isolation on another device or platform",
];

/// Lowercase, trimmed, with separators collapsed to `_`
pub fn normalize(error_type: &str) -> String {
    error_type
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == '.' || c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Error types that escalate urgency by one level
pub fn escalates(error_type: &str) -> bool {
    is_overflow(error_type) || is_null_reference(error_type)
}

fn is_overflow(error_type: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)overflow").ok())
        .as_ref()
        .map(|re| re.is_match(error_type))
        .unwrap_or(false)
}

fn is_null_reference(error_type: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?i)(null|nil)[_\-\s.]?(ref(erence)?|pointer|check|deref(erence)?)|^(npe|null|nil)$|unexpected[_\-\s.]?null",
            )
            .ok()
        })
        .as_ref()
        .map(|re| re.is_match(error_type))
        .unwrap_or(false)
}
