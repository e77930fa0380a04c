//! Domain types for supervised services and installation progress.

mod command;
mod install;
mod output;
pub mod plan;
mod service;

pub use command::CommandSpec;
pub use install::{InstallationProgress, InstallationStep, StepStatus, StepTransitionError};
pub use output::{Severity, StreamOrigin};
pub use plan::{BackendLayout, EnvironmentHandle, InstallPlan, ProgramRef, ServiceTemplate};
pub use service::{InvalidTransition, ManagedService, ServiceKind, ServiceSpec, ServiceState};
