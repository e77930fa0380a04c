//! Serializable description of which strategy a service uses.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{HybridStrategy, OneShotStrategy, OutputSignaledStrategy, ReadinessStrategy};

/// Phrases that mark a web server as accepting requests.
pub const DEFAULT_WEB_READY_PHRASES: &[&str] = &[
    "starting development server",
    "listening at",
    "uvicorn running on",
    "application startup complete",
    "booting worker",
];

/// Phrases that mark a background worker as consuming jobs.
pub const DEFAULT_WORKER_READY_PHRASES: &[&str] = &[
    "listening on",
    "worker started",
    "started with pid",
    "consumer started",
    "subscribing to channel",
];

/// Readiness policy attached to a service template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReadinessPolicy {
    OneShot,
    OutputSignaled {
        phrases: Vec<String>,
        #[serde(default)]
        startup_timeout_ms: Option<u64>,
    },
    Hybrid {
        phrases: Vec<String>,
        grace_ms: u64,
    },
}

impl ReadinessPolicy {
    /// Output-signaled policy with the default web phrases.
    pub fn web_server(startup_timeout_ms: Option<u64>) -> Self {
        Self::OutputSignaled {
            phrases: to_strings(DEFAULT_WEB_READY_PHRASES),
            startup_timeout_ms,
        }
    }

    /// Hybrid policy with the default worker phrases.
    pub fn job_worker(grace_ms: u64) -> Self {
        Self::Hybrid {
            phrases: to_strings(DEFAULT_WORKER_READY_PHRASES),
            grace_ms,
        }
    }

    /// Fresh strategy instance; strategies are single-use.
    pub fn build(&self) -> Box<dyn ReadinessStrategy> {
        match self {
            Self::OneShot => Box::new(OneShotStrategy::new()),
            Self::OutputSignaled {
                phrases,
                startup_timeout_ms,
            } => Box::new(OutputSignaledStrategy::new(
                phrases,
                startup_timeout_ms.map(Duration::from_millis),
            )),
            Self::Hybrid { phrases, grace_ms } => Box::new(HybridStrategy::new(
                phrases,
                Duration::from_millis(*grace_ms),
            )),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}
