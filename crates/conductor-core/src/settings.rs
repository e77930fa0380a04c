//! Orchestrator settings and validation.
//!
//! Timing knobs for readiness, termination and output draining. These are
//! pure values; loading them from disk is the adapter's job.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Optimistic-readiness grace window for hybrid workers.
pub const DEFAULT_WORKER_GRACE_MS: u64 = 3000;

/// Time between SIGTERM and SIGKILL.
pub const DEFAULT_TERMINATION_GRACE_MS: u64 = 5000;

/// How long buffered output is drained after a process exits.
pub const DEFAULT_OUTPUT_DRAIN_MS: u64 = 500;

/// Lines kept per service in the diagnostic ring buffer.
pub const DEFAULT_LOG_BUFFER_LINES: usize = 2000;

/// Orchestrator timing and buffering settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Grace window after which a silent, alive worker is treated as ready.
    pub worker_grace_ms: u64,

    /// Hard readiness timeout for output-signaled services. `None` waits
    /// for as long as the process lives.
    pub web_startup_timeout_ms: Option<u64>,

    /// Time a stopped process gets to exit before it is killed.
    pub termination_grace_ms: u64,

    /// Time to keep reading output after exit.
    pub output_drain_ms: u64,

    /// Per-service log ring buffer capacity.
    pub log_buffer_lines: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl OrchestratorSettings {
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            worker_grace_ms: DEFAULT_WORKER_GRACE_MS,
            web_startup_timeout_ms: None,
            termination_grace_ms: DEFAULT_TERMINATION_GRACE_MS,
            output_drain_ms: DEFAULT_OUTPUT_DRAIN_MS,
            log_buffer_lines: DEFAULT_LOG_BUFFER_LINES,
        }
    }

    #[must_use]
    pub const fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }

    #[must_use]
    pub const fn output_drain(&self) -> Duration {
        Duration::from_millis(self.output_drain_ms)
    }
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("Worker grace window must be between 100 and 600000 ms, got {0}")]
    InvalidGraceWindow(u64),

    #[error("Web startup timeout must be at least 1000 ms, got {0}")]
    InvalidStartupTimeout(u64),

    #[error("Termination grace must be between 100 and 120000 ms, got {0}")]
    InvalidTerminationGrace(u64),

    #[error("Output drain must be at most 10000 ms, got {0}")]
    InvalidOutputDrain(u64),

    #[error("Log buffer must hold between 10 and 100000 lines, got {0}")]
    InvalidLogBuffer(usize),
}

/// Validate settings values.
pub fn validate_settings(settings: &OrchestratorSettings) -> Result<(), SettingsError> {
    if !(100..=600_000).contains(&settings.worker_grace_ms) {
        return Err(SettingsError::InvalidGraceWindow(settings.worker_grace_ms));
    }

    if let Some(timeout) = settings.web_startup_timeout_ms {
        if timeout < 1000 {
            return Err(SettingsError::InvalidStartupTimeout(timeout));
        }
    }

    if !(100..=120_000).contains(&settings.termination_grace_ms) {
        return Err(SettingsError::InvalidTerminationGrace(
            settings.termination_grace_ms,
        ));
    }

    if settings.output_drain_ms > 10_000 {
        return Err(SettingsError::InvalidOutputDrain(settings.output_drain_ms));
    }

    if !(10..=100_000).contains(&settings.log_buffer_lines) {
        return Err(SettingsError::InvalidLogBuffer(settings.log_buffer_lines));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = OrchestratorSettings::with_defaults();
        assert_eq!(settings.worker_grace_ms, 3000);
        assert_eq!(settings.web_startup_timeout_ms, None);
        assert_eq!(settings.termination_grace(), Duration::from_secs(5));
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: OrchestratorSettings =
            serde_json::from_str(r#"{"worker_grace_ms": 1500}"#).unwrap();
        assert_eq!(settings.worker_grace_ms, 1500);
        assert_eq!(settings.log_buffer_lines, DEFAULT_LOG_BUFFER_LINES);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut settings = OrchestratorSettings::with_defaults();
        settings.worker_grace_ms = 0;
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::InvalidGraceWindow(0))
        ));

        let mut settings = OrchestratorSettings::with_defaults();
        settings.web_startup_timeout_ms = Some(10);
        assert!(validate_settings(&settings).is_err());

        let mut settings = OrchestratorSettings::with_defaults();
        settings.log_buffer_lines = 1;
        assert!(validate_settings(&settings).is_err());
    }
}
