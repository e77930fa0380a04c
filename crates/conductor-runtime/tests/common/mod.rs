//! Shared fixtures for runtime integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use conductor_core::{
    CommandSpec, EnvironmentHandle, EnvironmentProvisioner, EventSink, OrchestratorEvent,
    OrchestratorSettings, ProgramRef, ProvisionError, ReadinessPolicy, ServiceKind, ServiceState,
    ServiceTemplate, SetupState, SetupStateRepository, StatusEvent, StoreError,
};
use conductor_runtime::ServiceSupervisor;
use mockall::mock;

/// Upper bound for anything a test waits on.
pub const TEST_WAIT: Duration = Duration::from_secs(10);

/// Sink that keeps every event for later assertions.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<OrchestratorEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<OrchestratorEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Status events of one service, in emission order.
    pub fn statuses(&self, service: &str) -> Vec<StatusEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OrchestratorEvent::Status(s) if s.service == service => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self, service: &str) -> Vec<ServiceState> {
        self.statuses(service).into_iter().map(|s| s.state).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: OrchestratorEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn clone_box(&self) -> Box<dyn EventSink> {
        Box::new(self.clone())
    }
}

/// Settings with short shutdown timings.
pub fn fast_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        termination_grace_ms: 1000,
        output_drain_ms: 300,
        ..OrchestratorSettings::with_defaults()
    }
}

pub fn supervisor(sink: &RecordingSink) -> ServiceSupervisor {
    ServiceSupervisor::new(fast_settings(), Arc::new(sink.clone()))
}

/// A `sh -c` command.
pub fn sh(script: &str) -> CommandSpec {
    CommandSpec::new("sh").arg("-c").arg(script)
}

/// A plan entry run through the environment interpreter, which the tests
/// point at `/bin/sh`.
pub fn scripted(
    name: &str,
    kind: ServiceKind,
    script: &str,
    readiness: ReadinessPolicy,
) -> ServiceTemplate {
    ServiceTemplate {
        name: name.to_string(),
        label: format!("Run {name}"),
        kind,
        program: ProgramRef::EnvironmentInterpreter,
        args: vec!["-c".to_string(), script.to_string()],
        cwd: None,
        env: Default::default(),
        readiness,
    }
}

pub fn shell_environment(root: &Path) -> EnvironmentHandle {
    EnvironmentHandle::new(root, "/bin/sh")
}

mock! {
    pub Provisioner {}

    #[async_trait]
    impl EnvironmentProvisioner for Provisioner {
        async fn create_isolated_environment(
            &self,
            base: &Path,
        ) -> Result<EnvironmentHandle, ProvisionError>;

        async fn install_declared_dependencies(
            &self,
            environment: &EnvironmentHandle,
            manifest: &Path,
        ) -> Result<(), ProvisionError>;
    }
}

/// Setup-state store kept in memory, optionally refusing writes.
#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<Vec<SetupState>>,
    read_only: bool,
}

impl MemoryStore {
    pub fn read_only() -> Self {
        Self {
            saved: Mutex::default(),
            read_only: true,
        }
    }

    pub fn with_state(state: SetupState) -> Self {
        Self {
            saved: Mutex::new(vec![state]),
            read_only: false,
        }
    }

    pub fn saved(&self) -> Vec<SetupState> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl SetupStateRepository for MemoryStore {
    async fn load(&self) -> Result<SetupState, StoreError> {
        Ok(self.saved.lock().unwrap().last().cloned().unwrap_or_default())
    }

    async fn save(&self, state: &SetupState) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::Io {
                path: PathBuf::from("/readonly/setup_state.json"),
                reason: "read-only file system".to_string(),
            });
        }
        self.saved.lock().unwrap().push(state.clone());
        Ok(())
    }
}
