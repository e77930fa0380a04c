//! Installation sequencer.
//!
//! Steps run strictly in order: environment, dependencies, then every
//! service of the plan (one-shot services, then the web server, then the
//! job worker). Long-running services start one after another because the
//! worker assumes the web application's schema is in place.
//!
//! The first failure marks its step `Error`, emits `InstallationFailed` with
//! the failure message verbatim and stops. Completed steps are not rolled
//! back; re-running the installer is the recovery path.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use conductor_core::domain::plan::{DEPENDENCIES_STEP, ENVIRONMENT_STEP};
use conductor_core::{
    EnvironmentProvisioner, EventSink, InstallError, InstallPlan, InstallationProgress,
    InstallationStep, OrchestratorEvent, ServiceState, SetupState, SetupStateRepository,
    StepProgress, StepTransitionError,
};
use tracing::{info, warn};

use crate::process::ServiceSupervisor;

/// Drives one installation run over a supervisor and a provisioner.
pub struct InstallationSequencer {
    plan: InstallPlan,
    supervisor: ServiceSupervisor,
    provisioner: Arc<dyn EnvironmentProvisioner>,
    store: Arc<dyn SetupStateRepository>,
    sink: Arc<dyn EventSink>,
    progress: Mutex<InstallationProgress>,
}

impl InstallationSequencer {
    pub fn new(
        plan: InstallPlan,
        supervisor: ServiceSupervisor,
        provisioner: Arc<dyn EnvironmentProvisioner>,
        store: Arc<dyn SetupStateRepository>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let progress = InstallationProgress::new(Self::plan_steps(&plan));
        Self {
            plan,
            supervisor,
            provisioner,
            store,
            sink,
            progress: Mutex::new(progress),
        }
    }

    /// Steps for a plan, all `Pending`.
    pub fn plan_steps(plan: &InstallPlan) -> Vec<InstallationStep> {
        let mut steps = vec![
            InstallationStep::new(ENVIRONMENT_STEP, "Create isolated environment"),
            InstallationStep::new(DEPENDENCIES_STEP, "Install dependencies"),
        ];
        steps.extend(
            plan.services
                .iter()
                .map(|s| InstallationStep::new(s.name.clone(), s.label.clone())),
        );
        steps
    }

    /// Snapshot of every step.
    pub fn steps(&self) -> Vec<InstallationStep> {
        self.progress().steps().to_vec()
    }

    fn progress(&self) -> MutexGuard<'_, InstallationProgress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run every step. Returns the persisted setup state on success.
    pub async fn run(&self) -> Result<SetupState, InstallError> {
        info!(steps = self.progress().len(), "installation started");

        let environment = self
            .step(ENVIRONMENT_STEP, "Creating isolated environment", async {
                let environment = self
                    .provisioner
                    .create_isolated_environment(&self.plan.environment_base)
                    .await
                    .map_err(|e| e.to_string())?;
                let message = format!("Environment ready at {}", environment.root.display());
                Ok::<_, String>((environment, message))
            })
            .await?;

        self.step(DEPENDENCIES_STEP, "Installing dependencies", async {
            self.provisioner
                .install_declared_dependencies(&environment, &self.plan.manifest_path)
                .await
                .map_err(|e| e.to_string())?;
            Ok::<_, String>(((), "Dependencies installed".to_string()))
        })
        .await?;

        for template in &self.plan.services {
            let spec = template.resolve(&environment);
            self.step(&template.name, format!("{}...", template.label), async {
                let record = self
                    .supervisor
                    .start(spec)
                    .await
                    .map_err(|e| e.message())?;
                let message = match record.state {
                    ServiceState::Ready => format!("{} is running", template.name),
                    ServiceState::Exited => format!("{} completed", template.name),
                    other => format!("{} is {other}", template.name),
                };
                Ok::<_, String>(((), message))
            })
            .await?;
        }

        let state = SetupState::completed(&environment.root);
        if let Err(e) = self.store.save(&state).await {
            warn!(error = %e, "failed to persist setup state");
            return Err(InstallError::Persist(e));
        }

        info!(environment = %environment.root.display(), "installation completed");
        self.sink.emit(OrchestratorEvent::InstallationCompleted {
            environment_path: environment.root.clone(),
        });
        Ok(state)
    }

    async fn step<T>(
        &self,
        id: &str,
        activating: impl Into<String>,
        action: impl Future<Output = Result<(T, String), String>>,
    ) -> Result<T, InstallError> {
        self.transition(id, |p| p.activate(id, activating))?;
        info!(step = %id, "step started");

        match action.await {
            Ok((value, message)) => {
                self.transition(id, |p| p.complete(id, message))?;
                info!(step = %id, "step completed");
                Ok(value)
            }
            Err(message) => {
                self.transition(id, |p| p.fail(id, message.clone()))?;
                warn!(step = %id, %message, "step failed, halting installation");
                self.sink.emit(OrchestratorEvent::InstallationFailed {
                    step_id: id.to_string(),
                    message: message.clone(),
                });
                Err(InstallError::Halted {
                    step: id.to_string(),
                    message,
                })
            }
        }
    }

    /// Apply a step transition and emit the resulting progress event.
    fn transition(
        &self,
        id: &str,
        apply: impl FnOnce(
            &mut InstallationProgress,
        ) -> Result<&InstallationStep, StepTransitionError>,
    ) -> Result<(), InstallError> {
        let event = {
            let mut progress = self.progress();
            let total = progress.len();
            let index = progress.index_of(id).unwrap_or_default();
            match apply(&mut *progress) {
                Ok(step) => StepProgress::from_step(step, index, total),
                Err(e) => {
                    return Err(InstallError::Halted {
                        step: id.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        };
        self.sink.emit(event.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::{BackendLayout, OrchestratorSettings};

    #[test]
    fn plan_steps_follow_service_order() {
        let plan = BackendLayout::new("/srv/backend", "/var/lib/app")
            .install_plan(&OrchestratorSettings::with_defaults());
        let ids: Vec<String> = InstallationSequencer::plan_steps(&plan)
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(
            ids,
            [
                "environment",
                "dependencies",
                "migrations",
                "static-files",
                "web-server",
                "job-worker"
            ]
        );
    }
}
