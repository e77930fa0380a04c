//! Runtime side of conductor: processes, supervision, installation.
//!
//! [`OrchestratorContext`] wires the pieces together; the individual
//! components stay usable on their own (a supervisor can restart a single
//! service outside the installation flow).

#![deny(unsafe_code)]

mod context;
pub mod install;
pub mod process;
pub mod provision;
pub mod shutdown;

pub use context::OrchestratorContext;
pub use install::InstallationSequencer;
pub use process::{BroadcastSink, LogEntry, ProcessHandle, ServiceLogManager, ServiceSupervisor};
pub use provision::{JsonSetupStateStore, PROVISIONER_SERVICE, VenvProvisioner};
pub use shutdown::{DEFAULT_SHUTDOWN_PRIORITY, ShutdownCoordinator, ShutdownReport};
