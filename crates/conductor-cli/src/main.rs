//! CLI entry point.
//!
//! Parses arguments, installs tracing, bootstraps the orchestrator and
//! dispatches to a handler. Exit codes come from `CliError`.

use clap::{CommandFactory, Parser};

use conductor_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers, init_tracing};

#[tokio::main]
async fn main() {
    // Load environment variables before clap reads its `env` fallbacks.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
        let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command.as_ref() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    // No orchestrator needed.
    if let Commands::Classify { line, stderr } = command {
        handlers::classify::execute(line, *stderr);
        return Ok(());
    }

    let config = CliConfig::from_cli(&cli)?;
    let ctx = bootstrap(config);

    let result = match command {
        Commands::Install { stop_after } => handlers::install::execute(&ctx, *stop_after).await,
        Commands::Serve => handlers::serve::execute(&ctx).await,
        Commands::Start { service } => handlers::start::execute(&ctx, service).await,
        Commands::Status => handlers::status::execute(&ctx).await,
        Commands::Classify { .. } => Ok(()),
    };
    ctx.finish().await;
    result
}
