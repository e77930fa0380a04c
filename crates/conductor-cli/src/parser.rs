//! Root CLI parser with global options.

use clap::Parser;

use crate::commands::Commands;

/// Install and supervise a local web backend with its job worker.
#[derive(Parser)]
#[command(name = "conductor")]
#[command(about = "Install and supervise a local web backend")]
#[command(version)]
pub struct Cli {
    /// Directory holding the backend's manage.py (defaults to the current directory)
    #[arg(long = "backend-dir", env = "CONDUCTOR_BACKEND_DIR", global = true)]
    pub backend_dir: Option<String>,

    /// Override the data directory for this invocation
    #[arg(long = "data-dir", env = "CONDUCTOR_DATA_DIR", global = true)]
    pub data_dir: Option<String>,

    /// JSON file with orchestrator settings
    #[arg(long = "settings", env = "CONDUCTOR_SETTINGS", global = true)]
    pub settings: Option<String>,

    /// Address the web server binds to
    #[arg(long, env = "CONDUCTOR_HOST", default_value = "127.0.0.1", global = true)]
    pub host: String,

    /// Port the web server listens on
    #[arg(long, env = "CONDUCTOR_PORT", default_value_t = 8000, global = true)]
    pub port: u16,

    /// Run the backend with its debug flag set
    #[arg(long, env = "CONDUCTOR_DEBUG", global = true)]
    pub debug: bool,

    /// Enable verbose/debug output, including every line of service output
    #[arg(short = 'v', long = "verbose", env = "CONDUCTOR_VERBOSE", global = true)]
    pub verbose: bool,

    /// Print every orchestrator event as a JSON line on stdout instead of progress output
    #[arg(long = "json-events", env = "CONDUCTOR_JSON_EVENTS", global = true)]
    pub json_events: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from([
            "conductor",
            "--verbose",
            "--backend-dir",
            "/srv/backend",
            "--port",
            "8080",
            "status",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.backend_dir.as_deref(), Some("/srv/backend"));
        assert_eq!(cli.port, 8080);
        assert!(matches!(cli.command, Some(Commands::Status)));
    }

    #[test]
    fn test_every_option_has_env_fallback() {
        let cmd = Cli::command();
        for arg in cmd.get_arguments() {
            if arg.is_positional() || matches!(arg.get_id().as_str(), "help" | "version") {
                continue;
            }
            assert!(arg.get_env().is_some(), "--{} has no env fallback", arg.get_id());
        }
    }

    #[test]
    fn test_json_events_flag() {
        let cli = Cli::parse_from(["conductor", "install", "--json-events"]);
        assert!(cli.json_events);
        assert!(!Cli::parse_from(["conductor", "install"]).json_events);
    }

    #[test]
    fn test_classify_args() {
        let cli = Cli::parse_from([
            "conductor",
            "classify",
            "--stderr",
            "Traceback (most recent call last):",
        ]);
        match cli.command {
            Some(Commands::Classify { line, stderr }) => {
                assert!(stderr);
                assert!(line.starts_with("Traceback"));
            }
            _ => panic!("expected classify"),
        }
    }
}
