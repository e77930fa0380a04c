//! Coordinated shutdown of every supervised process.

use std::time::Duration;

use conductor_core::domain::plan::{JOB_WORKER, WEB_SERVER};
use tracing::{info, warn};

use crate::process::ServiceSupervisor;

/// Services stopped first, in this order. Consumers go before producers.
pub const DEFAULT_SHUTDOWN_PRIORITY: &[&str] = &[JOB_WORKER, WEB_SERVER];

/// Extra wait on top of the termination grace, covering SIGKILL and reaping.
const REAP_MARGIN: Duration = Duration::from_secs(1);

/// Outcome of a shutdown pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Services whose process exited.
    pub stopped: Vec<String>,
    /// Services still alive when the wait ran out.
    pub timed_out: Vec<String>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.timed_out.is_empty()
    }
}

/// Stops services one by one: the priority list first, then every other
/// running service in reverse start order.
///
/// Running it again after everything exited is a no-op.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    supervisor: ServiceSupervisor,
    priority: Vec<String>,
    exit_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(supervisor: ServiceSupervisor) -> Self {
        let exit_timeout = supervisor.settings().termination_grace() + REAP_MARGIN;
        Self {
            supervisor,
            priority: DEFAULT_SHUTDOWN_PRIORITY
                .iter()
                .map(ToString::to_string)
                .collect(),
            exit_timeout,
        }
    }

    #[must_use]
    pub fn with_priority<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_exit_timeout(mut self, timeout: Duration) -> Self {
        self.exit_timeout = timeout;
        self
    }

    /// Order in which the currently running services would be stopped.
    pub fn shutdown_order(&self) -> Vec<String> {
        let running = self.supervisor.running();
        let mut order: Vec<String> = self
            .priority
            .iter()
            .filter(|name| running.contains(name))
            .cloned()
            .collect();
        let rest: Vec<String> = running
            .into_iter()
            .rev()
            .filter(|name| !order.contains(name))
            .collect();
        order.extend(rest);
        order
    }

    /// Stop everything and wait for each exit in turn.
    pub async fn shutdown(&self) -> ShutdownReport {
        let order = self.shutdown_order();
        if order.is_empty() {
            return ShutdownReport::default();
        }
        info!(services = ?order, "shutting down services");

        let mut report = ShutdownReport::default();
        for name in order {
            self.supervisor.stop(&name);
            if self.supervisor.wait_for_exit(&name, self.exit_timeout).await {
                report.stopped.push(name);
            } else {
                warn!(
                    service = %name,
                    timeout_ms = self.exit_timeout.as_millis(),
                    "service did not exit in time"
                );
                report.timed_out.push(name);
            }
        }
        report
    }
}
