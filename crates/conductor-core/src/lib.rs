//! Core domain for conductor, the backend service orchestrator.
//!
//! Pure types and policies with no process side effects:
//!
//! - [`classify`] turns a free-form output line into a [`Severity`]
//! - [`readiness`] decides when a service is ready, complete or failed
//! - [`domain`] holds service records, install steps and install plans
//! - [`events`] is the outward event union
//! - [`ports`] declares the collaborators the runtime plugs in

#![deny(unused_crate_dependencies)]

pub mod classify;
pub mod domain;
pub mod events;
pub mod paths;
pub mod ports;
pub mod readiness;
pub mod settings;

pub use classify::{OutputClassifier, classify};
pub use domain::{
    BackendLayout, CommandSpec, EnvironmentHandle, InstallPlan, InstallationProgress,
    InstallationStep, InvalidTransition, ManagedService, ProgramRef, ServiceKind, ServiceSpec,
    ServiceState, ServiceTemplate, Severity, StepStatus, StepTransitionError, StreamOrigin,
};
pub use events::{LogEvent, OrchestratorEvent, StatusEvent, StepProgress};
pub use paths::{PathError, data_root, normalize_user_path, setup_state_path};
pub use ports::{
    CoreError, EnvironmentProvisioner, EventSink, InstallError, NoopSink, ProvisionError,
    ServiceError, SetupState, SetupStateRepository, StoreError,
};
pub use readiness::{FailureKind, ReadinessPolicy, ReadinessStrategy, Transition};
pub use settings::{OrchestratorSettings, SettingsError, validate_settings};
