//! Severity classification for free-form process output.
//!
//! This is a permissive heuristic, not a parser. Long-running servers and
//! workers routinely write ordinary diagnostics to stderr, so the error
//! stream alone never makes a line an error. Hard-failure markers always do.
//!
//! Precedence, first match wins:
//!
//! 1. hard-failure marker → `Error`
//! 2. known benign diagnostic → `Info`
//! 3. warning marker → `Warning`
//! 4. success marker → `Success`
//! 5. stderr → `Warning`, stdout → `Info`

use crate::domain::{Severity, StreamOrigin};

const ERROR_MARKERS: &[&str] = &["error:", "exception", "traceback", "failed", "critical:"];

const BENIGN_PATTERNS: &[&str] = &[
    // web server startup and autoreload chatter
    "watching for file changes",
    "performing system checks",
    "system check identified no issues",
    "starting development server",
    "quit the server with",
    "django version",
    "autoreload",
    "statreloader",
    // job worker banners
    "worker rq:worker",
    "listening on",
    "cleaning registries",
    "subscribing to channel",
    "registered tasks",
    "worker registered",
    "consumer started",
];

const WARNING_MARKERS: &[&str] = &["warning:", "deprecated", "ignore"];

const SUCCESS_MARKERS: &[&str] = &["successfully", "completed", "ready", "started"];

/// Classify one line with the built-in pattern sets.
pub fn classify(line: &str, origin: StreamOrigin) -> Severity {
    classify_with(line, origin, &[])
}

fn contains_any<S: AsRef<str>>(haystack: &str, needles: &[S]) -> bool {
    needles.iter().any(|n| haystack.contains(n.as_ref()))
}

fn classify_with(line: &str, origin: StreamOrigin, extra_benign: &[String]) -> Severity {
    let lower = line.to_lowercase();

    if contains_any(&lower, ERROR_MARKERS) {
        Severity::Error
    } else if contains_any(&lower, BENIGN_PATTERNS) || contains_any(&lower, extra_benign) {
        Severity::Info
    } else if contains_any(&lower, WARNING_MARKERS) {
        Severity::Warning
    } else if contains_any(&lower, SUCCESS_MARKERS) {
        Severity::Success
    } else if origin.is_error_stream() {
        Severity::Warning
    } else {
        Severity::Info
    }
}

/// Classifier with service-specific benign patterns on top of the defaults.
#[derive(Debug, Clone, Default)]
pub struct OutputClassifier {
    extra_benign: Vec<String>,
}

impl OutputClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add benign patterns, matched case-insensitively.
    #[must_use]
    pub fn with_benign_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra_benign
            .extend(patterns.into_iter().map(|p| p.as_ref().to_lowercase()));
        self
    }

    pub fn classify(&self, line: &str, origin: StreamOrigin) -> Severity {
        classify_with(line, origin, &self.extra_benign)
    }
}
