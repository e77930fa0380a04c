//! Readiness strategies: deciding from process output when a service is up.
//!
//! No health endpoint is assumed reachable while a backend boots, so
//! readiness is inferred from unstructured output plus a bounded wait. Each
//! service kind gets its own strategy so that a change to one service's
//! startup banner cannot affect another.
//!
//! Strategies are pure state machines. The supervisor feeds them classified
//! lines, the process exit, and timer expiry; they answer with at most one
//! terminal [`Transition`] over their lifetime.

mod hybrid;
mod one_shot;
mod output_signaled;
mod policy;

use std::time::Duration;

use crate::domain::Severity;
use crate::events::LogEvent;

pub use hybrid::HybridStrategy;
pub use one_shot::OneShotStrategy;
pub use output_signaled::OutputSignaledStrategy;
pub use policy::{DEFAULT_WEB_READY_PHRASES, DEFAULT_WORKER_READY_PHRASES, ReadinessPolicy};

/// Why a service failed to become ready or complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The process exited before readiness (or non-zero, for one-shot).
    Exited { code: Option<i32> },
    /// No ready signal within the startup timeout.
    Timeout { waited: Duration },
}

/// Terminal decision of a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Long-running service is accepting work.
    Ready { message: String },
    /// One-shot service finished with exit code 0.
    Completed { message: String },
    Failed { kind: FailureKind, message: String },
}

impl Transition {
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Ready { message }
            | Self::Completed { message }
            | Self::Failed { message, .. } => message,
        }
    }
}

/// Per-service policy turning observed output into a lifecycle transition.
pub trait ReadinessStrategy: Send {
    /// Feed one classified output line.
    fn observe(&mut self, event: &LogEvent) -> Option<Transition>;

    /// The process exited. Returns `None` once the strategy already settled.
    fn on_exit(&mut self, code: Option<i32>) -> Option<Transition>;

    /// Time after spawn at which `on_timeout` should be consulted.
    fn deadline(&self) -> Option<Duration> {
        None
    }

    /// The deadline elapsed and the process is still alive.
    fn on_timeout(&mut self, _elapsed: Duration) -> Option<Transition> {
        None
    }

    /// True once a terminal transition has been emitted.
    fn is_settled(&self) -> bool;
}

/// Remembers the most useful lines for failure messages.
#[derive(Debug, Default, Clone)]
pub(crate) struct LastLines {
    last_error: Option<String>,
    last_line: Option<String>,
}

impl LastLines {
    pub(crate) fn record(&mut self, event: &LogEvent) {
        let text = event.message.trim();
        if text.is_empty() {
            return;
        }
        if event.severity == Severity::Error {
            self.last_error = Some(text.to_string());
        }
        self.last_line = Some(text.to_string());
    }

    /// Last error line, falling back to the last line of any severity.
    pub(crate) fn best(&self) -> Option<&str> {
        self.last_error.as_deref().or(self.last_line.as_deref())
    }

    pub(crate) fn exit_message(&self, code: Option<i32>) -> String {
        let status = code.map_or_else(
            || "terminated by signal".to_string(),
            |c| format!("exit code {c}"),
        );
        match self.best() {
            Some(line) => format!("{line} ({status})"),
            None => format!("process exited without output ({status})"),
        }
    }
}

/// Case-insensitive phrase matcher shared by the long-running strategies.
#[derive(Debug, Clone)]
pub(crate) struct PhraseSet {
    phrases: Vec<String>,
}

impl PhraseSet {
    pub(crate) fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub(crate) fn matches(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        self.phrases.iter().any(|p| lower.contains(p.as_str()))
    }
}
