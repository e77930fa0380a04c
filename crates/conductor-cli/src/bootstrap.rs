//! CLI bootstrap, the composition root.
//!
//! The only place where concrete implementations are chosen:
//! - `VenvProvisioner` for the isolated environment
//! - `JsonSetupStateStore` under the data directory
//! - `TerminalSink` for every event, or a `BroadcastSink` feeding the JSON
//!   line writer with `--json-events`
//!
//! Handlers receive the composed [`CliContext`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use conductor_core::{
    BackendLayout, EventSink, InstallPlan, OrchestratorSettings, data_root, normalize_user_path,
    validate_settings,
};
use conductor_runtime::{BroadcastSink, JsonSetupStateStore, OrchestratorContext, VenvProvisioner};
use tokio::task::JoinHandle;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::error::CliError;
use crate::json_events;
use crate::parser::Cli;
use crate::progress::TerminalSink;

/// Install the tracing subscriber. `RUST_LOG` takes precedence.
pub fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resolved options for one invocation.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub backend_dir: PathBuf,
    pub data_dir: PathBuf,
    pub settings: OrchestratorSettings,
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub verbose: bool,
    pub json_events: bool,
}

impl CliConfig {
    /// Resolve paths and load settings from parsed arguments.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let backend_dir = match cli.backend_dir.as_deref() {
            Some(raw) => normalize_user_path(raw).map_err(|e| CliError::Config(e.to_string()))?,
            None => std::env::current_dir()?,
        };
        let data_dir = match cli.data_dir.as_deref() {
            Some(raw) => normalize_user_path(raw).map_err(|e| CliError::Config(e.to_string()))?,
            None => data_root().map_err(|e| CliError::Config(e.to_string()))?,
        };
        let settings = load_settings(cli.settings.as_deref().map(Path::new))?;

        Ok(Self {
            backend_dir,
            data_dir,
            settings,
            host: cli.host.clone(),
            port: cli.port,
            debug: cli.debug,
            verbose: cli.verbose,
            json_events: cli.json_events,
        })
    }

    /// The backend layout these options describe.
    pub fn layout(&self) -> BackendLayout {
        let mut layout = BackendLayout::new(&self.backend_dir, &self.data_dir);
        layout.host.clone_from(&self.host);
        layout.port = self.port;
        layout.debug = self.debug;
        layout
    }
}

/// Read and validate a settings file. Missing fields take their defaults.
pub fn load_settings(path: Option<&Path>) -> Result<OrchestratorSettings, CliError> {
    let settings = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                CliError::Config(format!("cannot read {}: {e}", path.display()))
            })?;
            serde_json::from_str(&raw).map_err(|e| {
                CliError::Config(format!("invalid settings in {}: {e}", path.display()))
            })?
        }
        None => OrchestratorSettings::with_defaults(),
    };
    validate_settings(&settings).map_err(|e| CliError::Config(e.to_string()))?;
    Ok(settings)
}

/// Fully composed context for command handlers.
pub struct CliContext {
    pub config: CliConfig,
    pub plan: InstallPlan,
    pub orchestrator: OrchestratorContext,
    json_writer: Option<JoinHandle<()>>,
}

impl CliContext {
    pub const fn orchestrator(&self) -> &OrchestratorContext {
        &self.orchestrator
    }

    pub const fn plan(&self) -> &InstallPlan {
        &self.plan
    }

    /// Release the orchestrator and let the JSON writer flush what is left.
    pub async fn finish(self) {
        let Self {
            orchestrator,
            json_writer,
            ..
        } = self;
        drop(orchestrator);
        if let Some(writer) = json_writer {
            if tokio::time::timeout(WRITER_FLUSH, writer).await.is_err() {
                debug!("event stream still open, exiting without waiting");
            }
        }
    }
}

/// Upper bound on waiting for the JSON writer at exit.
const WRITER_FLUSH: Duration = Duration::from_secs(1);

/// Wire the orchestrator for one invocation.
///
/// With `json_events` the writer task is spawned here, so this must run
/// inside a tokio runtime.
pub fn bootstrap(config: CliConfig) -> CliContext {
    let (events, json_writer): (Arc<dyn EventSink>, _) = if config.json_events {
        let broadcast = BroadcastSink::new();
        let writer = json_events::spawn_stdout_writer(broadcast.subscribe());
        (Arc::new(broadcast), Some(writer))
    } else {
        (Arc::new(TerminalSink::new(config.verbose)), None)
    };

    let plan = config.layout().install_plan(&config.settings);
    let provisioner = Arc::new(VenvProvisioner::new(Arc::clone(&events)));
    let store = Arc::new(JsonSetupStateStore::in_data_root(&config.data_dir));
    let orchestrator =
        OrchestratorContext::new(config.settings.clone(), events, provisioner, store);

    CliContext {
        config,
        plan,
        orchestrator,
        json_writer,
    }
}
