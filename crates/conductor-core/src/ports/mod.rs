//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports define what the orchestrator expects from infrastructure: an event
//! sink, an environment provisioner and a setup-state repository. They use
//! only domain types.
//!
//! # Design Rules
//!
//! - No process or filesystem implementation details in signatures
//! - Every port has a trivial implementation usable in tests
//! - Errors carry a human-readable message suitable for a setup wizard

pub mod event_sink;
pub mod provisioner;
pub mod setup_state;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub use event_sink::{EventSink, NoopSink};
pub use provisioner::EnvironmentProvisioner;
pub use setup_state::{SetupState, SetupStateRepository};

/// Process-level failures of a supervised service.
///
/// Classification and readiness decisions never surface here; only spawn
/// failures, exits and hard readiness timeouts do.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The OS could not create the process.
    #[error("Failed to start {service}: {reason}")]
    Spawn { service: String, reason: String },

    /// No ready signal within a hard startup timeout.
    #[error("{service} did not become ready within {} ms: {message}", .waited.as_millis())]
    ReadinessTimeout {
        service: String,
        waited: Duration,
        message: String,
    },

    /// Non-zero exit of a one-shot service, or exit of a long-running
    /// service before it was ready.
    #[error("{service} exited unexpectedly: {message}")]
    UnexpectedExit {
        service: String,
        code: Option<i32>,
        message: String,
    },

    /// A live process is already tracked under this name.
    #[error("{0} is already running")]
    AlreadyRunning(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// The message shown to the operator, without the service prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Spawn { reason, .. } => reason.clone(),
            Self::ReadinessTimeout { message, .. } | Self::UnexpectedExit { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

/// Failures of the environment-provisioning collaborator.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("No usable interpreter found: {0}")]
    InterpreterNotFound(String),

    #[error("Dependency manifest not found: {}", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("`{command}` failed: {message}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        message: String,
    },

    #[error("I/O error at {}: {reason}", .path.display())]
    Io { path: PathBuf, reason: String },
}

/// Failures of setup-state persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access {}: {reason}", .path.display())]
    Io { path: PathBuf, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failures of the installation sequence.
#[derive(Debug, Error)]
pub enum InstallError {
    /// A step failed; later steps did not run.
    #[error("Installation halted at step '{step}': {message}")]
    Halted { step: String, message: String },

    /// Every step succeeded but the setup state could not be saved.
    #[error("Failed to persist setup state: {0}")]
    Persist(#[from] StoreError),
}

impl InstallError {
    /// Id of the step that failed, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::Halted { step, .. } => Some(step),
            Self::Persist(_) => None,
        }
    }
}

/// Core error type for semantic domain errors.
///
/// Adapters map this to their own error types (CLI exit codes, IPC payloads).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Settings(#[from] crate::settings::SettingsError),

    #[error(transparent)]
    Path(#[from] crate::paths::PathError),

    /// Configuration error (unknown service, missing directory, ...).
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
