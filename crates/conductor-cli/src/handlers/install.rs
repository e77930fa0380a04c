//! Install command handler.

use anyhow::Result;
use conductor_core::CoreError;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::{hold_until_interrupted, shutdown};

/// Run the full installation sequence, then keep the services running.
pub async fn execute(ctx: &CliContext, stop_after: bool) -> Result<()> {
    eprintln!("Installing backend from {}", ctx.config.backend_dir.display());

    if let Err(e) = ctx.orchestrator().install(ctx.plan().clone()).await {
        shutdown(ctx).await;
        return Err(CliError::from(CoreError::from(e)).into());
    }

    if stop_after {
        shutdown(ctx).await;
        return Ok(());
    }
    hold_until_interrupted(ctx).await
}
