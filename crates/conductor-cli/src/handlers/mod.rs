//! Command handlers.
//!
//! Each handler is a thin wrapper: resolve CLI input, call the
//! orchestrator, format the result. Errors leave as `anyhow` carrying a
//! [`CliError`](crate::CliError) so that `main` can pick the exit code.

pub mod classify;
pub mod install;
pub mod serve;
pub mod start;
pub mod status;

use std::time::Duration;

use anyhow::Result;
use console::style;
use tracing::warn;

use crate::bootstrap::CliContext;
use crate::error::CliError;

const LIVENESS_POLL: Duration = Duration::from_millis(500);

/// Keep the services up until Ctrl-C, or until none is left running.
///
/// Either way ends with a coordinated shutdown.
pub(crate) async fn hold_until_interrupted(ctx: &CliContext) -> Result<()> {
    let supervisor = ctx.orchestrator().supervisor();
    eprintln!(
        "{} Services running. Press Ctrl+C to stop.",
        style("●").green()
    );

    let all_exited = async {
        while !supervisor.running().is_empty() {
            tokio::time::sleep(LIVENESS_POLL).await;
        }
    };

    let interrupted = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for Ctrl-C");
            }
            true
        }
        () = all_exited => false,
    };

    shutdown(ctx).await;
    if interrupted {
        Ok(())
    } else {
        Err(CliError::Service("every service exited".to_string()).into())
    }
}

/// Stop everything and report services that outlived the timeout.
pub(crate) async fn shutdown(ctx: &CliContext) {
    let report = ctx.orchestrator().shutdown().await;
    if !report.stopped.is_empty() {
        eprintln!("Stopped {}", report.stopped.join(", "));
    }
    for name in &report.timed_out {
        eprintln!("{} {name} did not exit in time", style("!").yellow().bold());
    }
}
