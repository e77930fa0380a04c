//! Status command handler.

use anyhow::Result;
use chrono::Local;
use console::style;
use conductor_core::{ReadinessPolicy, ServiceKind};

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Print the persisted setup state and the service plan.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let state = ctx
        .orchestrator()
        .setup_state()
        .await
        .map_err(|e| CliError::Io(e.to_string()))?;

    println!("{}", style("Backend").bold());
    println!("  directory:    {}", ctx.config.backend_dir.display());
    println!("  data:         {}", ctx.config.data_dir.display());

    println!("{}", style("Setup").bold());
    if state.setup_completed {
        println!("  completed:    {}", style("yes").green());
    } else {
        println!("  completed:    {}", style("no").yellow());
    }
    if let Some(path) = &state.environment_path {
        println!("  environment:  {}", path.display());
    }
    if let Some(at) = state.completed_at {
        println!(
            "  installed at: {}",
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        );
    }

    println!("{}", style("Services").bold());
    for template in &ctx.plan().services {
        let kind = match template.kind {
            ServiceKind::OneShot => "one-shot",
            ServiceKind::LongRunning => "long-running",
        };
        println!(
            "  {:<14} {:<13} {}",
            template.name,
            kind,
            describe_readiness(&template.readiness)
        );
    }
    Ok(())
}

fn describe_readiness(policy: &ReadinessPolicy) -> String {
    match policy {
        ReadinessPolicy::OneShot => "completes on exit code 0".to_string(),
        ReadinessPolicy::OutputSignaled {
            startup_timeout_ms: Some(ms),
            ..
        } => format!("ready on startup banner (timeout {ms} ms)"),
        ReadinessPolicy::OutputSignaled { .. } => "ready on startup banner".to_string(),
        ReadinessPolicy::Hybrid { grace_ms, .. } => {
            format!("ready on banner or after {grace_ms} ms alive")
        }
    }
}
