//! Install plans: which services to run, in which order, with which commands.
//!
//! A plan is resolved against an [`EnvironmentHandle`] once the isolated
//! environment exists, because most backend commands run through the
//! environment's interpreter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::command::CommandSpec;
use super::service::{ServiceKind, ServiceSpec};
use crate::readiness::ReadinessPolicy;
use crate::settings::OrchestratorSettings;

/// Step id of the environment-creation step.
pub const ENVIRONMENT_STEP: &str = "environment";
/// Step id of the dependency-installation step.
pub const DEPENDENCIES_STEP: &str = "dependencies";

/// Service names used by the standard backend plan.
pub const MIGRATIONS: &str = "migrations";
pub const STATIC_FILES: &str = "static-files";
pub const WEB_SERVER: &str = "web-server";
pub const JOB_WORKER: &str = "job-worker";

/// A provisioned isolated runtime environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentHandle {
    /// Root directory of the environment.
    pub root: PathBuf,
    /// Interpreter inside the environment.
    pub interpreter: PathBuf,
}

impl EnvironmentHandle {
    pub fn new(root: impl Into<PathBuf>, interpreter: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            interpreter: interpreter.into(),
        }
    }
}

/// Where a service's executable comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgramRef {
    /// The interpreter of the provisioned environment.
    EnvironmentInterpreter,
    /// A fixed executable path.
    Executable { path: PathBuf },
}

/// A service description that still needs an environment to become concrete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTemplate {
    pub name: String,
    /// Title shown for the matching installation step.
    pub label: String,
    pub kind: ServiceKind,
    pub program: ProgramRef,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub readiness: ReadinessPolicy,
}

impl ServiceTemplate {
    /// Build the concrete spec for a provisioned environment.
    pub fn resolve(&self, environment: &EnvironmentHandle) -> ServiceSpec {
        let program = match &self.program {
            ProgramRef::EnvironmentInterpreter => environment.interpreter.clone(),
            ProgramRef::Executable { path } => path.clone(),
        };
        let mut command = CommandSpec::new(program)
            .args(self.args.iter().cloned())
            .envs(&self.env);
        if let Some(cwd) = &self.cwd {
            command = command.current_dir(cwd);
        }
        ServiceSpec::new(
            self.name.clone(),
            self.kind,
            command,
            self.readiness.clone(),
        )
    }
}

/// Complete description of a first-run installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallPlan {
    /// Directory in which the isolated environment is created.
    pub environment_base: PathBuf,
    /// Dependency manifest (e.g. `requirements.txt`).
    pub manifest_path: PathBuf,
    /// Services in start order. One-shot services first by convention.
    pub services: Vec<ServiceTemplate>,
}

impl InstallPlan {
    pub fn service(&self, name: &str) -> Option<&ServiceTemplate> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Names of the long-running services, in start order.
    pub fn long_running(&self) -> impl Iterator<Item = &ServiceTemplate> {
        self.services
            .iter()
            .filter(|s| s.kind == ServiceKind::LongRunning)
    }
}

/// Filesystem layout and flags of a web backend with a job worker.
///
/// Produces the standard plan: migrate, collect static assets, run the web
/// server, run the background worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendLayout {
    /// Directory holding `manage.py`.
    pub backend_dir: PathBuf,
    /// Directory for the backend's database, media and static output.
    pub data_dir: PathBuf,
    /// Where the isolated environment lives.
    pub environment_dir: PathBuf,
    /// Dependency manifest, relative paths resolve against `backend_dir`.
    pub manifest: PathBuf,
    /// Settings module exported to every service.
    pub settings_module: String,
    pub host: String,
    pub port: u16,
    pub debug: bool,
    /// Queue names consumed by the job worker.
    pub queues: Vec<String>,
}

impl BackendLayout {
    /// Layout with conventional defaults under `backend_dir`.
    pub fn new(backend_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        let backend_dir = backend_dir.into();
        let data_dir = data_dir.into();
        Self {
            environment_dir: data_dir.join("venv"),
            manifest: PathBuf::from("requirements.txt"),
            settings_module: "backend.settings".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            debug: false,
            queues: vec!["default".to_string()],
            backend_dir,
            data_dir,
        }
    }

    fn manifest_path(&self) -> PathBuf {
        if self.manifest.is_absolute() {
            self.manifest.clone()
        } else {
            self.backend_dir.join(&self.manifest)
        }
    }

    /// Environment shared by every backend service.
    pub fn service_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert(
            "DJANGO_SETTINGS_MODULE".to_string(),
            self.settings_module.clone(),
        );
        env.insert("APP_DATA_DIR".to_string(), path_string(&self.data_dir));
        env.insert(
            "APP_DEBUG".to_string(),
            if self.debug { "1" } else { "0" }.to_string(),
        );
        env.insert("PYTHONUNBUFFERED".to_string(), "1".to_string());
        env
    }

    fn manage(
        &self,
        name: &str,
        label: &str,
        kind: ServiceKind,
        args: &[String],
    ) -> ServiceTemplate {
        let mut all_args = vec!["manage.py".to_string()];
        all_args.extend(args.iter().cloned());
        ServiceTemplate {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            program: ProgramRef::EnvironmentInterpreter,
            args: all_args,
            cwd: Some(self.backend_dir.clone()),
            env: self.service_env(),
            readiness: ReadinessPolicy::OneShot,
        }
    }

    /// The standard four-service plan.
    pub fn install_plan(&self, settings: &OrchestratorSettings) -> InstallPlan {
        let strings = |items: &[&str]| items.iter().map(ToString::to_string).collect::<Vec<_>>();

        let migrations = self.manage(
            MIGRATIONS,
            "Migrate database",
            ServiceKind::OneShot,
            &strings(&["migrate", "--noinput"]),
        );
        let static_files = self.manage(
            STATIC_FILES,
            "Collect static assets",
            ServiceKind::OneShot,
            &strings(&["collectstatic", "--noinput", "--clear"]),
        );

        let mut web = self.manage(
            WEB_SERVER,
            "Start web server",
            ServiceKind::LongRunning,
            &[
                "runserver".to_string(),
                format!("{}:{}", self.host, self.port),
                "--noreload".to_string(),
            ],
        );
        web.readiness = ReadinessPolicy::web_server(settings.web_startup_timeout_ms);

        let mut worker_args = vec!["rqworker".to_string()];
        worker_args.extend(self.queues.iter().cloned());
        let mut worker = self.manage(
            JOB_WORKER,
            "Start job worker",
            ServiceKind::LongRunning,
            &worker_args,
        );
        worker.readiness = ReadinessPolicy::job_worker(settings.worker_grace_ms);

        InstallPlan {
            environment_base: self.environment_dir.clone(),
            manifest_path: self.manifest_path(),
            services: vec![migrations, static_files, web, worker],
        }
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
