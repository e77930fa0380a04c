//! Start command handler: one service of the plan on its own.

use anyhow::Result;
use conductor_core::ServiceKind;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::hold_until_interrupted;

pub async fn execute(ctx: &CliContext, service: &str) -> Result<()> {
    let orchestrator = ctx.orchestrator();
    let environment = orchestrator
        .installed_environment()
        .await
        .map_err(CliError::from)?;

    let record = orchestrator
        .start_service(ctx.plan(), &environment, service)
        .await
        .map_err(CliError::from)?;

    match record.kind {
        ServiceKind::OneShot => {
            eprintln!("{service} completed");
            Ok(())
        }
        ServiceKind::LongRunning => hold_until_interrupted(ctx).await,
    }
}
