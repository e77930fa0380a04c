//! Outward event union consumed by UI sinks.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "status", "service": "web-server", "state": "ready", "message": "..." }
//! ```
//!
//! Ordering is preserved per service and per stream only. Consumers must not
//! rely on ordering across services.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::{InstallationStep, ServiceState, Severity, StepStatus, StreamOrigin};

/// A service changed state or produced a human-relevant readiness message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub service: String,
    pub state: ServiceState,
    pub message: String,
}

impl StatusEvent {
    pub fn new(
        service: impl Into<String>,
        state: ServiceState,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            state,
            message: message.into(),
        }
    }
}

/// One classified line of process output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub service: String,
    pub stream: StreamOrigin,
    pub severity: Severity,
    pub message: String,
}

impl LogEvent {
    pub fn new(
        service: impl Into<String>,
        stream: StreamOrigin,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            stream,
            severity,
            message: message.into(),
        }
    }
}

/// Installation step progress for the setup wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepProgress {
    pub step_id: String,
    pub label: String,
    pub status: StepStatus,
    pub message: String,
    /// Zero-based position of the step.
    pub index: usize,
    pub total: usize,
}

impl StepProgress {
    pub fn from_step(step: &InstallationStep, index: usize, total: usize) -> Self {
        Self {
            step_id: step.id.clone(),
            label: step.label.clone(),
            status: step.status,
            message: step.message.clone(),
            index,
            total,
        }
    }
}

/// Every event the orchestrator pushes outward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    Status(StatusEvent),
    Log(LogEvent),
    Step(StepProgress),
    /// Every installation step completed.
    InstallationCompleted {
        #[serde(rename = "environmentPath")]
        environment_path: PathBuf,
    },
    /// The sequence halted on its first failure.
    InstallationFailed {
        #[serde(rename = "stepId")]
        step_id: String,
        message: String,
    },
}

impl OrchestratorEvent {
    /// Channel name adapters use when forwarding the event.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Status(_) => "service:status",
            Self::Log(_) => "service:log",
            Self::Step(_) => "install:step",
            Self::InstallationCompleted { .. } => "install:completed",
            Self::InstallationFailed { .. } => "install:failed",
        }
    }

    /// Service the event belongs to, for service-scoped events.
    pub fn service(&self) -> Option<&str> {
        match self {
            Self::Status(e) => Some(&e.service),
            Self::Log(e) => Some(&e.service),
            _ => None,
        }
    }
}

impl From<StatusEvent> for OrchestratorEvent {
    fn from(event: StatusEvent) -> Self {
        Self::Status(event)
    }
}

impl From<LogEvent> for OrchestratorEvent {
    fn from(event: LogEvent) -> Self {
        Self::Log(event)
    }
}

impl From<StepProgress> for OrchestratorEvent {
    fn from(event: StepProgress) -> Self {
        Self::Step(event)
    }
}
