//! Terminal rendering of orchestrator events.
//!
//! Installation steps drive an `indicatif` bar; status changes and notable
//! output lines are printed above it. Everything goes to stderr so that
//! stdout stays usable for command results.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use conductor_core::{
    EventSink, LogEvent, OrchestratorEvent, ServiceState, Severity, StatusEvent, StepProgress,
    StepStatus,
};
use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};

/// Event sink that renders to the terminal.
///
/// Clones share the same bar.
#[derive(Clone)]
pub struct TerminalSink {
    inner: Arc<Inner>,
}

struct Inner {
    bar: Mutex<Option<ProgressBar>>,
    term: Term,
    verbose: bool,
}

impl TerminalSink {
    /// With `verbose`, every output line is shown; otherwise only warnings
    /// and errors.
    pub fn new(verbose: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                bar: Mutex::new(None),
                term: Term::stderr(),
                verbose,
            }),
        }
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.inner.bar.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn step_bar(total: usize) -> ProgressBar {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template("{spinner:.green} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        bar
    }

    /// Print a line without tearing the progress bar.
    fn print(&self, line: &str) {
        let guard = self.bar();
        let write = || {
            let _ = self.inner.term.write_line(line);
        };
        match guard.as_ref() {
            Some(bar) => bar.suspend(write),
            None => write(),
        }
    }

    fn on_step(&self, progress: &StepProgress) {
        match progress.status {
            StepStatus::Active => {
                let mut guard = self.bar();
                let bar = guard.get_or_insert_with(|| Self::step_bar(progress.total));
                bar.set_position(progress.index as u64);
                bar.set_message(format!("{}: {}", progress.label, progress.message));
            }
            StepStatus::Completed => {
                if let Some(bar) = self.bar().as_ref() {
                    bar.set_position(progress.index as u64 + 1);
                }
                self.print(&format!(
                    "{} {} {}",
                    style("✔").green(),
                    progress.label,
                    style(&progress.message).dim()
                ));
            }
            StepStatus::Error => {
                self.print(&format!(
                    "{} {} {}",
                    style("✗").red().bold(),
                    progress.label,
                    style(&progress.message).red()
                ));
            }
            StepStatus::Pending => {}
        }
    }

    fn on_status(&self, status: &StatusEvent) {
        let state = match status.state {
            ServiceState::Ready => style(status.state.label()).green(),
            ServiceState::Failed => style(status.state.label()).red().bold(),
            ServiceState::Exited => style(status.state.label()).yellow(),
            _ => style(status.state.label()).cyan(),
        };
        self.print(&format!(
            "[{}] {state}: {}",
            style(&status.service).bold(),
            status.message
        ));
    }

    fn on_log(&self, log: &LogEvent) {
        let line = match log.severity {
            Severity::Error => style(&log.message).red(),
            Severity::Warning => style(&log.message).yellow(),
            Severity::Success if self.inner.verbose => style(&log.message).green(),
            _ if self.inner.verbose => style(&log.message).dim(),
            _ => return,
        };
        self.print(&format!("  {} {line}", style(format!("{} |", log.service)).dim()));
    }

    /// Stop the bar, leaving the last state on screen.
    fn finish(&self) {
        if let Some(bar) = self.bar().take() {
            bar.finish_and_clear();
        }
    }
}

impl EventSink for TerminalSink {
    fn emit(&self, event: OrchestratorEvent) {
        match &event {
            OrchestratorEvent::Step(progress) => self.on_step(progress),
            OrchestratorEvent::Status(status) => self.on_status(status),
            OrchestratorEvent::Log(log) => self.on_log(log),
            OrchestratorEvent::InstallationCompleted { environment_path } => {
                self.finish();
                self.print(&format!(
                    "{} Installation complete (environment: {})",
                    style("✔").green().bold(),
                    environment_path.display()
                ));
            }
            OrchestratorEvent::InstallationFailed { step_id, message } => {
                self.finish();
                self.print(&format!(
                    "{} Installation failed at {}: {message}",
                    style("✗").red().bold(),
                    style(step_id).bold()
                ));
            }
        }
    }

    fn clone_box(&self) -> Box<dyn EventSink> {
        Box::new(self.clone())
    }
}
