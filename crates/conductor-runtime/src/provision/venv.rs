//! Python virtualenv provisioner.
//!
//! Creates the isolated environment with `python -m venv` and installs the
//! declared dependencies with `pip install -r`. A marker file records the
//! SHA-256 of the manifest that was last installed, so re-running the
//! installer skips pip when nothing changed.
//!
//! Tool output goes through the classifier to the event sink under the
//! pseudo-service [`PROVISIONER_SERVICE`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use conductor_core::readiness::{OneShotStrategy, ReadinessStrategy, Transition};
use conductor_core::{
    CommandSpec, EnvironmentHandle, EnvironmentProvisioner, EventSink, LogEvent, OutputClassifier,
    ProvisionError, Severity, StreamOrigin,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::process::ProcessHandle;

/// Service name attached to provisioning output.
pub const PROVISIONER_SERVICE: &str = "provisioner";

const DEPS_MARKER_NAME: &str = ".conductor-deps.json";

#[cfg(target_os = "windows")]
const PYTHON_CANDIDATES: &[&str] = &["python"];

#[cfg(not(target_os = "windows"))]
const PYTHON_CANDIDATES: &[&str] = &["python3", "python"];

/// What was installed into an environment last time.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
struct DepsMarker {
    manifest_sha256: String,
    interpreter: PathBuf,
}

/// `EnvironmentProvisioner` for Python backends.
pub struct VenvProvisioner {
    sink: Arc<dyn EventSink>,
    classifier: OutputClassifier,
    bootstrap: Option<PathBuf>,
}

impl VenvProvisioner {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            classifier: OutputClassifier::new(),
            bootstrap: None,
        }
    }

    /// Use this interpreter to create environments instead of searching PATH.
    #[must_use]
    pub fn with_bootstrap_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.bootstrap = Some(interpreter.into());
        self
    }

    /// Interpreter location inside an environment rooted at `root`.
    pub fn interpreter_path(root: &Path) -> PathBuf {
        if cfg!(windows) {
            root.join("Scripts").join("python.exe")
        } else {
            let bin = root.join("bin");
            let python3 = bin.join("python3");
            if python3.exists() {
                python3
            } else {
                bin.join("python")
            }
        }
    }

    fn find_bootstrap(&self) -> Result<PathBuf, ProvisionError> {
        if let Some(path) = &self.bootstrap {
            return Ok(path.clone());
        }
        PYTHON_CANDIDATES
            .iter()
            .find_map(|candidate| which::which(candidate).ok())
            .ok_or_else(|| {
                ProvisionError::InterpreterNotFound(format!(
                    "tried {} in PATH",
                    PYTHON_CANDIDATES.join(", ")
                ))
            })
    }

    fn note(&self, message: impl Into<String>) {
        self.sink.emit(
            LogEvent::new(
                PROVISIONER_SERVICE,
                StreamOrigin::Stdout,
                Severity::Info,
                message,
            )
            .into(),
        );
    }

    /// Run a provisioning command to completion, streaming its output.
    async fn run(&self, command: CommandSpec) -> Result<(), ProvisionError> {
        let shown = command.display_line();
        info!(command = %shown, "running provisioning command");

        let handle = ProcessHandle::spawn(PROVISIONER_SERVICE, &command).map_err(|e| {
            ProvisionError::CommandFailed {
                command: shown.clone(),
                code: None,
                message: e.to_string(),
            }
        })?;
        let (mut exit, mut output) = handle.split();

        let mut strategy = OneShotStrategy::new();
        while let Some(line) = output.next_line().await {
            let severity = self.classifier.classify(&line.text, line.origin);
            let event = LogEvent::new(PROVISIONER_SERVICE, line.origin, severity, line.text);
            strategy.observe(&event);
            self.sink.emit(event.into());
        }

        let code = exit
            .wait()
            .await
            .map_err(|e| ProvisionError::CommandFailed {
                command: shown.clone(),
                code: None,
                message: e.to_string(),
            })?;

        match strategy.on_exit(code) {
            Some(Transition::Failed { message, .. }) => Err(ProvisionError::CommandFailed {
                command: shown,
                code,
                message,
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl EnvironmentProvisioner for VenvProvisioner {
    async fn create_isolated_environment(
        &self,
        base: &Path,
    ) -> Result<EnvironmentHandle, ProvisionError> {
        let interpreter = Self::interpreter_path(base);
        if interpreter.exists() {
            info!(path = %base.display(), "reusing existing environment");
            self.note(format!("Reusing environment at {}", base.display()));
            return Ok(EnvironmentHandle::new(base, interpreter));
        }

        if let Some(parent) = base.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ProvisionError::Io {
                    path: parent.to_path_buf(),
                    reason: e.to_string(),
                })?;
        }

        let bootstrap = self.find_bootstrap()?;
        self.note(format!("Creating environment at {}", base.display()));
        self.run(
            CommandSpec::new(bootstrap)
                .args(["-m", "venv"])
                .arg(base.to_string_lossy()),
        )
        .await?;

        let interpreter = Self::interpreter_path(base);
        if !interpreter.exists() {
            return Err(ProvisionError::InterpreterNotFound(format!(
                "environment at {} has no interpreter",
                base.display()
            )));
        }
        Ok(EnvironmentHandle::new(base, interpreter))
    }

    async fn install_declared_dependencies(
        &self,
        environment: &EnvironmentHandle,
        manifest: &Path,
    ) -> Result<(), ProvisionError> {
        if !manifest.is_file() {
            return Err(ProvisionError::ManifestNotFound(manifest.to_path_buf()));
        }

        let digest = manifest_digest(manifest).await?;
        let marker = DepsMarker {
            manifest_sha256: digest,
            interpreter: environment.interpreter.clone(),
        };
        if marker_matches(&environment.root, &marker).await {
            info!(manifest = %manifest.display(), "dependencies up to date");
            self.note("Dependencies already up to date");
            return Ok(());
        }

        let pip = |args: &[&str]| {
            CommandSpec::new(&environment.interpreter)
                .args(["-m", "pip"])
                .args(args.iter().copied())
                .env("PIP_DISABLE_PIP_VERSION_CHECK", "1")
                .env("PYTHONUNBUFFERED", "1")
        };

        self.run(pip(&["install", "--upgrade", "pip"])).await?;
        self.run(pip(&["install", "-r"]).arg(manifest.to_string_lossy()))
            .await?;

        write_marker(&environment.root, &marker).await
    }
}

/// Hex SHA-256 of a dependency manifest.
pub async fn manifest_digest(manifest: &Path) -> Result<String, ProvisionError> {
    let bytes = tokio::fs::read(manifest)
        .await
        .map_err(|e| ProvisionError::Io {
            path: manifest.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

async fn marker_matches(root: &Path, expected: &DepsMarker) -> bool {
    let Ok(content) = tokio::fs::read_to_string(root.join(DEPS_MARKER_NAME)).await else {
        return false;
    };
    match serde_json::from_str::<DepsMarker>(&content) {
        Ok(marker) => marker == *expected,
        Err(e) => {
            debug!(error = %e, "ignoring unreadable dependency marker");
            false
        }
    }
}

async fn write_marker(root: &Path, marker: &DepsMarker) -> Result<(), ProvisionError> {
    let path = root.join(DEPS_MARKER_NAME);
    let content = serde_json::to_string_pretty(marker).map_err(|e| ProvisionError::Io {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    tokio::fs::write(&path, content)
        .await
        .map_err(|e| ProvisionError::Io {
            path,
            reason: e.to_string(),
        })
}
