//! Serve command handler.
//!
//! Starts the long-running services of a backend installed earlier.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::{hold_until_interrupted, shutdown};

pub async fn execute(ctx: &CliContext) -> Result<()> {
    let orchestrator = ctx.orchestrator();
    let environment = orchestrator
        .installed_environment()
        .await
        .map_err(CliError::from)?;

    if let Err(e) = orchestrator.serve(ctx.plan(), &environment).await {
        shutdown(ctx).await;
        return Err(CliError::from(e).into());
    }

    // stderr, so `--json-events` keeps stdout to the event stream.
    eprintln!("Web server: http://{}:{}/", ctx.config.host, ctx.config.port);
    hold_until_interrupted(ctx).await
}
