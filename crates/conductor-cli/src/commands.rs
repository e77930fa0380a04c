//! Subcommands of the `conductor` binary.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Create the environment, install dependencies, migrate and start every service
    Install {
        /// Stop the services again once installation finished
        #[arg(long)]
        stop_after: bool,
    },

    /// Start the web server and job worker of an installed backend
    Serve,

    /// Start a single service of the backend plan
    Start {
        /// Service name (migrations, static-files, web-server, job-worker)
        service: String,
    },

    /// Show the persisted setup state and the service plan
    Status,

    /// Classify one line of output the way the supervisor would
    Classify {
        /// The output line
        line: String,
        /// Treat the line as read from stderr
        #[arg(long)]
        stderr: bool,
    },
}
