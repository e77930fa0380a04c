//! Strategy for services that run to completion.

use super::{FailureKind, LastLines, ReadinessStrategy, Transition};
use crate::events::LogEvent;

/// Completes on exit code 0, fails on anything else. Never reports `Ready`.
#[derive(Debug, Default)]
pub struct OneShotStrategy {
    lines: LastLines,
    settled: bool,
}

impl OneShotStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReadinessStrategy for OneShotStrategy {
    fn observe(&mut self, event: &LogEvent) -> Option<Transition> {
        self.lines.record(event);
        None
    }

    fn on_exit(&mut self, code: Option<i32>) -> Option<Transition> {
        if self.settled {
            return None;
        }
        self.settled = true;
        if code == Some(0) {
            let message = self
                .lines
                .best()
                .map_or_else(|| "completed".to_string(), |line| format!("completed: {line}"));
            Some(Transition::Completed { message })
        } else {
            Some(Transition::Failed {
                kind: FailureKind::Exited { code },
                message: self.lines.exit_message(code),
            })
        }
    }

    fn is_settled(&self) -> bool {
        self.settled
    }
}
