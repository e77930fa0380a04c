//! Managed service records and their lifecycle state machine.
//!
//! A `ManagedService` is the supervisor's bookkeeping for one subprocess. It
//! carries no process handle itself; the runtime pairs it with the handle it
//! owns. Transitions are guarded here so that every adapter gets the same
//! invariants:
//!
//! - a one-shot service never reaches `Ready`
//! - `started_at`, `ready_at` and `exited_at` are each set at most once
//! - `Failed` and `Exited` are terminal for a given run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::command::CommandSpec;
use crate::readiness::ReadinessPolicy;

/// Whether a service runs to completion or is expected to stay up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Runs to completion and exits (migrations, static collection).
    OneShot,
    /// Expected to persist once ready (web server, job worker).
    LongRunning,
}

/// Lifecycle state of a managed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    NotStarted,
    Starting,
    Ready,
    Failed,
    Exited,
}

impl ServiceState {
    /// True for `Failed` and `Exited`.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Exited)
    }

    /// Short lowercase label used in UI output.
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Exited => "exited",
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A transition that the state machine refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{service}: cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub service: String,
    pub from: ServiceState,
    pub to: ServiceState,
}

/// Everything needed to launch one service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Stable identifier, e.g. `web-server`.
    pub name: String,
    pub kind: ServiceKind,
    pub command: CommandSpec,
    pub readiness: ReadinessPolicy,
}

impl ServiceSpec {
    pub fn new(
        name: impl Into<String>,
        kind: ServiceKind,
        command: CommandSpec,
        readiness: ReadinessPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            command,
            readiness,
        }
    }

    /// A one-shot service that completes on exit code 0.
    pub fn one_shot(name: impl Into<String>, command: CommandSpec) -> Self {
        Self::new(name, ServiceKind::OneShot, command, ReadinessPolicy::OneShot)
    }

    /// A long-running service with the given readiness policy.
    pub fn long_running(
        name: impl Into<String>,
        command: CommandSpec,
        readiness: ReadinessPolicy,
    ) -> Self {
        Self::new(name, ServiceKind::LongRunning, command, readiness)
    }
}

/// Supervisor-side record for one subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedService {
    pub name: String,
    pub kind: ServiceKind,
    pub state: ServiceState,
    /// OS process id while a process is attached.
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub exited_at: Option<DateTime<Utc>>,
}

impl ManagedService {
    /// Create a record in the `NotStarted` state.
    pub fn new(name: impl Into<String>, kind: ServiceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            state: ServiceState::NotStarted,
            pid: None,
            exit_code: None,
            started_at: None,
            ready_at: None,
            exited_at: None,
        }
    }

    fn refuse(&self, to: ServiceState) -> InvalidTransition {
        InvalidTransition {
            service: self.name.clone(),
            from: self.state,
            to,
        }
    }

    /// `NotStarted → Starting`, recording the attached pid.
    pub fn mark_starting(&mut self, pid: Option<u32>) -> Result<(), InvalidTransition> {
        if self.state != ServiceState::NotStarted {
            return Err(self.refuse(ServiceState::Starting));
        }
        self.state = ServiceState::Starting;
        self.pid = pid;
        self.started_at.get_or_insert_with(Utc::now);
        Ok(())
    }

    /// `Starting → Ready`. Refused for one-shot services.
    pub fn mark_ready(&mut self) -> Result<(), InvalidTransition> {
        if self.kind == ServiceKind::OneShot || self.state != ServiceState::Starting {
            return Err(self.refuse(ServiceState::Ready));
        }
        self.state = ServiceState::Ready;
        self.ready_at.get_or_insert_with(Utc::now);
        Ok(())
    }

    /// `Starting | Ready → Failed`.
    ///
    /// The pid is kept: a service can fail its readiness check while the
    /// process is still alive and being terminated.
    pub fn mark_failed(&mut self) -> Result<(), InvalidTransition> {
        if !matches!(self.state, ServiceState::Starting | ServiceState::Ready) {
            return Err(self.refuse(ServiceState::Failed));
        }
        self.state = ServiceState::Failed;
        Ok(())
    }

    /// `Starting | Ready → Exited` with the process exit code.
    pub fn mark_exited(&mut self, code: Option<i32>) -> Result<(), InvalidTransition> {
        if !matches!(self.state, ServiceState::Starting | ServiceState::Ready) {
            return Err(self.refuse(ServiceState::Exited));
        }
        self.state = ServiceState::Exited;
        self.exit_code = code;
        self.release(code);
        Ok(())
    }

    /// Detach the process after it is gone. Valid in any state.
    pub fn release(&mut self, code: Option<i32>) {
        self.pid = None;
        if self.exit_code.is_none() {
            self.exit_code = code;
        }
        self.exited_at.get_or_insert_with(Utc::now);
    }

    /// True while the service occupies its name (starting or ready).
    pub const fn is_active(&self) -> bool {
        matches!(self.state, ServiceState::Starting | ServiceState::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_never_becomes_ready() {
        let mut svc = ManagedService::new("migrations", ServiceKind::OneShot);
        svc.mark_starting(Some(42)).unwrap();
        let err = svc.mark_ready().unwrap_err();
        assert_eq!(err.to, ServiceState::Ready);
        assert_eq!(svc.state, ServiceState::Starting);

        svc.mark_exited(Some(0)).unwrap();
        assert_eq!(svc.state, ServiceState::Exited);
        assert_eq!(svc.exit_code, Some(0));
        assert!(svc.pid.is_none());
    }

    #[test]
    fn long_running_lifecycle_sets_timestamps_once() {
        let mut svc = ManagedService::new("web-server", ServiceKind::LongRunning);
        svc.mark_starting(Some(7)).unwrap();
        let started = svc.started_at;
        svc.mark_ready().unwrap();
        let ready = svc.ready_at;
        assert!(svc.mark_ready().is_err());
        assert_eq!(svc.ready_at, ready);

        svc.mark_exited(Some(1)).unwrap();
        let exited = svc.exited_at;
        svc.release(Some(9));
        assert_eq!(svc.started_at, started);
        assert_eq!(svc.exited_at, exited);
        assert_eq!(svc.exit_code, Some(1));
    }

    #[test]
    fn terminal_states_refuse_further_transitions() {
        let mut svc = ManagedService::new("job-worker", ServiceKind::LongRunning);
        assert!(svc.mark_failed().is_err());
        svc.mark_starting(None).unwrap();
        svc.mark_failed().unwrap();
        assert!(svc.mark_exited(Some(0)).is_err());
        assert!(svc.mark_starting(None).is_err());
        assert!(svc.state.is_terminal());
    }
}
