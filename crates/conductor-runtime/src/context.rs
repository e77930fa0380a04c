//! Explicit orchestrator state.
//!
//! Everything one orchestrator instance needs lives here: settings, the
//! event sink, the supervisor (sole owner of process handles) and the
//! external collaborators. Independent instances share nothing, which is
//! what lets tests run several side by side.

use std::sync::Arc;

use conductor_core::{
    CoreError, EnvironmentHandle, EnvironmentProvisioner, EventSink, InstallError, InstallPlan,
    ManagedService, OrchestratorSettings, OutputClassifier, SetupState, SetupStateRepository,
    StoreError,
};
use tracing::info;

use crate::install::InstallationSequencer;
use crate::process::ServiceSupervisor;
use crate::shutdown::{ShutdownCoordinator, ShutdownReport};

pub struct OrchestratorContext {
    settings: OrchestratorSettings,
    sink: Arc<dyn EventSink>,
    supervisor: ServiceSupervisor,
    provisioner: Arc<dyn EnvironmentProvisioner>,
    store: Arc<dyn SetupStateRepository>,
}

impl OrchestratorContext {
    pub fn new(
        settings: OrchestratorSettings,
        sink: Arc<dyn EventSink>,
        provisioner: Arc<dyn EnvironmentProvisioner>,
        store: Arc<dyn SetupStateRepository>,
    ) -> Self {
        Self::with_classifier(settings, sink, provisioner, store, OutputClassifier::new())
    }

    pub fn with_classifier(
        settings: OrchestratorSettings,
        sink: Arc<dyn EventSink>,
        provisioner: Arc<dyn EnvironmentProvisioner>,
        store: Arc<dyn SetupStateRepository>,
        classifier: OutputClassifier,
    ) -> Self {
        let supervisor =
            ServiceSupervisor::with_classifier(settings.clone(), Arc::clone(&sink), classifier);
        Self {
            settings,
            sink,
            supervisor,
            provisioner,
            store,
        }
    }

    pub const fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn sink(&self) -> Arc<dyn EventSink> {
        Arc::clone(&self.sink)
    }

    pub const fn supervisor(&self) -> &ServiceSupervisor {
        &self.supervisor
    }

    /// A fresh sequencer for one installation run.
    pub fn sequencer(&self, plan: InstallPlan) -> InstallationSequencer {
        InstallationSequencer::new(
            plan,
            self.supervisor.clone(),
            Arc::clone(&self.provisioner),
            Arc::clone(&self.store),
            Arc::clone(&self.sink),
        )
    }

    /// Run the full installation sequence.
    pub async fn install(&self, plan: InstallPlan) -> Result<SetupState, InstallError> {
        self.sequencer(plan).run().await
    }

    pub async fn setup_state(&self) -> Result<SetupState, StoreError> {
        self.store.load().await
    }

    /// Environment recorded by a completed installation.
    pub async fn installed_environment(&self) -> Result<EnvironmentHandle, CoreError> {
        let state = self.store.load().await?;
        let path = state
            .environment_path
            .filter(|_| state.setup_completed)
            .ok_or_else(|| {
                CoreError::Configuration(
                    "backend is not installed yet, run the installer first".to_string(),
                )
            })?;
        Ok(self.provisioner.create_isolated_environment(&path).await?)
    }

    /// Start one service of the plan on its own.
    pub async fn start_service(
        &self,
        plan: &InstallPlan,
        environment: &EnvironmentHandle,
        name: &str,
    ) -> Result<ManagedService, CoreError> {
        let template = plan
            .service(name)
            .ok_or_else(|| CoreError::Configuration(format!("unknown service: {name}")))?;
        Ok(self.supervisor.start(template.resolve(environment)).await?)
    }

    /// Start the long-running services of an installed backend, in order.
    pub async fn serve(
        &self,
        plan: &InstallPlan,
        environment: &EnvironmentHandle,
    ) -> Result<Vec<ManagedService>, CoreError> {
        let mut started = Vec::new();
        for template in plan.long_running() {
            info!(service = %template.name, "starting");
            started.push(self.supervisor.start(template.resolve(environment)).await?);
        }
        Ok(started)
    }

    pub fn shutdown_coordinator(&self) -> ShutdownCoordinator {
        ShutdownCoordinator::new(self.supervisor.clone())
    }

    /// Stop every running service in shutdown order.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.shutdown_coordinator().shutdown().await
    }
}
