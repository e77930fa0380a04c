//! Strategy for long-running services that announce readiness in their output.

use std::time::Duration;

use super::{FailureKind, LastLines, PhraseSet, ReadinessStrategy, Transition};
use crate::events::LogEvent;

/// Ready on the first line matching a ready-phrase, on either stream.
///
/// Exiting before that line is a failure. With a startup timeout, staying
/// silent past it is a failure too; without one the strategy waits for as
/// long as the process lives.
#[derive(Debug)]
pub struct OutputSignaledStrategy {
    phrases: PhraseSet,
    startup_timeout: Option<Duration>,
    lines: LastLines,
    settled: bool,
}

impl OutputSignaledStrategy {
    pub fn new<I, S>(phrases: I, startup_timeout: Option<Duration>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: PhraseSet::new(phrases),
            startup_timeout,
            lines: LastLines::default(),
            settled: false,
        }
    }
}

impl ReadinessStrategy for OutputSignaledStrategy {
    fn observe(&mut self, event: &LogEvent) -> Option<Transition> {
        self.lines.record(event);
        if self.settled || !self.phrases.matches(&event.message) {
            return None;
        }
        self.settled = true;
        Some(Transition::Ready {
            message: event.message.trim().to_string(),
        })
    }

    fn on_exit(&mut self, code: Option<i32>) -> Option<Transition> {
        if self.settled {
            return None;
        }
        self.settled = true;
        Some(Transition::Failed {
            kind: FailureKind::Exited { code },
            message: format!(
                "exited before becoming ready: {}",
                self.lines.exit_message(code)
            ),
        })
    }

    fn deadline(&self) -> Option<Duration> {
        self.startup_timeout
    }

    fn on_timeout(&mut self, elapsed: Duration) -> Option<Transition> {
        let limit = self.startup_timeout?;
        if self.settled || elapsed < limit {
            return None;
        }
        self.settled = true;
        let mut message = format!("no ready signal within {} ms", limit.as_millis());
        if let Some(line) = self.lines.best() {
            message.push_str("; last output: ");
            message.push_str(line);
        }
        Some(Transition::Failed {
            kind: FailureKind::Timeout { waited: elapsed },
            message,
        })
    }

    fn is_settled(&self) -> bool {
        self.settled
    }
}
