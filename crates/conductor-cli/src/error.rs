//! CLI error type and exit codes.

use conductor_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Core(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A supervised process failed.
    #[error("Service error: {0}")]
    Service(String),

    /// The installation sequence halted or could not be recorded.
    #[error("Installation failed: {0}")]
    Install(String),
}

impl CliError {
    /// Exit code, following sysexits.h where a category fits.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Core(_) | Self::Install(_) => 1,
            Self::Service(_) => 71, // EX_OSERR
            Self::Io(_) => 74,      // EX_IOERR
            Self::Config(_) => 78,  // EX_CONFIG
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Service(e) => Self::Service(e.to_string()),
            CoreError::Install(e) => Self::Install(e.to_string()),
            CoreError::Provision(e) => Self::Service(e.to_string()),
            CoreError::Store(e) => Self::Io(e.to_string()),
            CoreError::Settings(e) => Self::Config(e.to_string()),
            CoreError::Path(e) => Self::Config(e.to_string()),
            CoreError::Configuration(msg) => Self::Config(msg),
            CoreError::Internal(msg) => Self::Core(msg),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
