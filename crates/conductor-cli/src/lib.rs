//! Command-line adapter for conductor.
//!
//! `main.rs` parses arguments and dispatches; [`bootstrap`] is the only
//! place where the runtime pieces are wired together.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;

// Used by the binary only.
use dotenvy as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod json_events;
pub mod parser;
pub mod progress;

pub use bootstrap::{CliConfig, CliContext, bootstrap, init_tracing};
pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;
pub use progress::TerminalSink;
