//! Strategy for workers that may or may not print a startup banner.

use std::time::Duration;

use super::{FailureKind, LastLines, PhraseSet, ReadinessStrategy, Transition};
use crate::events::LogEvent;

/// Ready on a ready-phrase, or optimistically once the grace window passes
/// with the process still alive.
///
/// An exit inside the window is a failure, never an optimistic ready.
#[derive(Debug)]
pub struct HybridStrategy {
    phrases: PhraseSet,
    grace: Duration,
    lines: LastLines,
    settled: bool,
}

impl HybridStrategy {
    pub fn new<I, S>(phrases: I, grace: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: PhraseSet::new(phrases),
            grace,
            lines: LastLines::default(),
            settled: false,
        }
    }

    pub const fn grace(&self) -> Duration {
        self.grace
    }
}

impl ReadinessStrategy for HybridStrategy {
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
                "exited during startup: {}",
                self.lines.exit_message(code)
            ),
        })
    }

    fn deadline(&self) -> Option<Duration> {
        Some(self.grace)
    }

    fn on_timeout(&mut self, elapsed: Duration) -> Option<Transition> {
        if self.settled || elapsed < self.grace {
            return None;
        }
        self.settled = true;
        Some(Transition::Ready {
            message: format!(
                "no startup banner after {} ms, assuming ready",
                self.grace.as_millis()
            ),
        })
    }

    fn is_settled(&self) -> bool {
        self.settled
    }
}
