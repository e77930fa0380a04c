//! Installation steps and their progress state machine.
//!
//! Every step moves `Pending → Active → {Completed | Error}`. The list-level
//! invariants (one active step at a time, strict ordering, halt on first
//! error) are enforced by [`InstallationProgress`].

use serde::{Deserialize, Serialize};

/// Progress of a single installation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
    Error,
}

impl StepStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// One named step of the installation sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationStep {
    /// Stable identifier, e.g. `dependencies` or `web-server`.
    pub id: String,
    /// Human-readable title for the setup wizard.
    pub label: String,
    pub status: StepStatus,
    pub message: String,
}

impl InstallationStep {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            status: StepStatus::Pending,
            message: String::new(),
        }
    }
}

/// Refused step transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepTransitionError {
    #[error("unknown step: {0}")]
    UnknownStep(String),

    #[error("step {step} is {status:?}, expected {expected:?}")]
    WrongStatus {
        step: String,
        status: StepStatus,
        expected: StepStatus,
    },

    #[error("step {step} cannot start before {blocking} completes")]
    Blocked { step: String, blocking: String },

    #[error("sequence halted at {0}")]
    Halted(String),
}

/// Ordered list of steps with list-level invariants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallationProgress {
    steps: Vec<InstallationStep>,
}

impl InstallationProgress {
    pub const fn new(steps: Vec<InstallationStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[InstallationStep] {
        &self.steps
    }

    pub fn get(&self, id: &str) -> Option<&InstallationStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Position of a step in the sequence.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The step that halted the sequence, if any.
    pub fn failed_step(&self) -> Option<&InstallationStep> {
        self.steps.iter().find(|s| s.status == StepStatus::Error)
    }

    /// The currently active step, if any.
    pub fn active_step(&self) -> Option<&InstallationStep> {
        self.steps.iter().find(|s| s.status == StepStatus::Active)
    }

    /// True when every step completed.
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }

    /// `Pending → Active`, only if every preceding step is `Completed`.
    pub fn activate(
        &mut self,
        id: &str,
        message: impl Into<String>,
    ) -> Result<&InstallationStep, StepTransitionError> {
        if let Some(failed) = self.failed_step() {
            return Err(StepTransitionError::Halted(failed.id.clone()));
        }
        let idx = self.require(id, StepStatus::Pending)?;
        if let Some(blocking) = self.steps[..idx]
            .iter()
            .find(|s| s.status != StepStatus::Completed)
        {
            return Err(StepTransitionError::Blocked {
                step: id.to_string(),
                blocking: blocking.id.clone(),
            });
        }
        let step = &mut self.steps[idx];
        step.status = StepStatus::Active;
        step.message = message.into();
        Ok(step)
    }

    /// `Active → Completed`.
    pub fn complete(
        &mut self,
        id: &str,
        message: impl Into<String>,
    ) -> Result<&InstallationStep, StepTransitionError> {
        self.finish(id, StepStatus::Completed, message.into())
    }

    /// `Active → Error`. Halts every later step.
    pub fn fail(
        &mut self,
        id: &str,
        message: impl Into<String>,
    ) -> Result<&InstallationStep, StepTransitionError> {
        self.finish(id, StepStatus::Error, message.into())
    }

    fn finish(
        &mut self,
        id: &str,
        status: StepStatus,
        message: String,
    ) -> Result<&InstallationStep, StepTransitionError> {
        let idx = self.require(id, StepStatus::Active)?;
        let step = &mut self.steps[idx];
        step.status = status;
        step.message = message;
        Ok(step)
    }

    fn require(&self, id: &str, expected: StepStatus) -> Result<usize, StepTransitionError> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| StepTransitionError::UnknownStep(id.to_string()))?;
        let status = self.steps[idx].status;
        if status != expected {
            return Err(StepTransitionError::WrongStatus {
                step: id.to_string(),
                status,
                expected,
            });
        }
        Ok(idx)
    }
}
