//! Service supervision: spawn, classify output, decide readiness, stop.
//!
//! Every started service gets a monitor task that exclusively owns the
//! process handle. The monitor multiplexes four event sources:
//!
//! - output lines, classified and forwarded to the sink, the log buffer and
//!   the readiness strategy
//! - process exit
//! - a stop request (SIGTERM, then SIGKILL after the termination grace)
//! - the strategy's deadline, if it has one
//!
//! `start` resolves when the strategy settles. Bookkeeping lives in a
//! registry behind a short-lived std mutex that is never held across an
//! await point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use conductor_core::readiness::{FailureKind, ReadinessStrategy, Transition};
use conductor_core::{
    EventSink, InvalidTransition, LogEvent, ManagedService, OrchestratorSettings,
    OutputClassifier, ReadinessPolicy, ServiceError, ServiceKind, ServiceSpec, ServiceState,
    StatusEvent,
};
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handle::{ProcessExit, ProcessHandle, ProcessOutput};
use super::logs::{LogEntry, ServiceLogManager};
use super::stream::OutputLine;

struct Tracked {
    /// Distinguishes restarts of the same name; also the start order.
    run_id: u64,
    record: ManagedService,
    stop: CancellationToken,
    alive: watch::Receiver<bool>,
}

impl Tracked {
    fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }
}

#[derive(Default)]
struct Registry {
    services: HashMap<String, Tracked>,
    next_run: u64,
}

impl Registry {
    fn is_alive(&self, name: &str) -> bool {
        self.services.get(name).is_some_and(Tracked::is_alive)
    }

    fn ordered(&self) -> Vec<&Tracked> {
        let mut tracked: Vec<&Tracked> = self.services.values().collect();
        tracked.sort_by_key(|t| t.run_id);
        tracked
    }
}

struct Shared {
    registry: Mutex<Registry>,
    sink: Arc<dyn EventSink>,
    logs: ServiceLogManager,
    classifier: OutputClassifier,
    settings: OrchestratorSettings,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit_status(&self, service: &str, state: ServiceState, message: impl Into<String>) {
        self.sink.emit(StatusEvent::new(service, state, message).into());
    }
}

/// Owns every supervised process of one orchestrator instance.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct ServiceSupervisor {
    shared: Arc<Shared>,
}

impl ServiceSupervisor {
    pub fn new(settings: OrchestratorSettings, sink: Arc<dyn EventSink>) -> Self {
        Self::with_classifier(settings, sink, OutputClassifier::new())
    }

    /// Supervisor classifying output with extra benign patterns.
    pub fn with_classifier(
        settings: OrchestratorSettings,
        sink: Arc<dyn EventSink>,
        classifier: OutputClassifier,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                sink,
                logs: ServiceLogManager::new(settings.log_buffer_lines),
                classifier,
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.shared.settings
    }

    /// Start a service and wait until it is ready (long-running) or has
    /// completed (one-shot).
    ///
    /// Returns the service record at that moment. Fails on spawn errors,
    /// on exit before readiness, on non-zero one-shot exit and on a hard
    /// readiness timeout. A service that fails while still alive is
    /// terminated.
    pub async fn start(&self, spec: ServiceSpec) -> Result<ManagedService, ServiceError> {
        let name = spec.name.clone();
        let strategy = match spec.kind {
            ServiceKind::OneShot => ReadinessPolicy::OneShot.build(),
            ServiceKind::LongRunning => spec.readiness.build(),
        };

        let launched = {
            let mut registry = self.shared.registry();
            if registry.is_alive(&name) {
                return Err(ServiceError::AlreadyRunning(name));
            }
            registry.next_run += 1;
            let run_id = registry.next_run;
            let mut record = ManagedService::new(&name, spec.kind);

            match ProcessHandle::spawn(&name, &spec.command) {
                Ok(handle) => {
                    note(&name, record.mark_starting(handle.pid()));
                    let (alive_tx, alive_rx) = watch::channel(true);
                    let stop = CancellationToken::new();
                    registry.services.insert(
                        name.clone(),
                        Tracked {
                            run_id,
                            record,
                            stop: stop.clone(),
                            alive: alive_rx,
                        },
                    );
                    Ok((run_id, handle, stop, alive_tx))
                }
                Err(e) => {
                    note(&name, record.mark_starting(None));
                    note(&name, record.mark_failed());
                    record.release(None);
                    registry.services.insert(
                        name.clone(),
                        Tracked {
                            run_id,
                            record,
                            stop: CancellationToken::new(),
                            alive: watch::channel(false).1,
                        },
                    );
                    Err(e)
                }
            }
        };

        self.shared.logs.clear(&name);
        self.shared.emit_status(
            &name,
            ServiceState::Starting,
            format!("starting: {}", spec.command.display_line()),
        );

        let (run_id, handle, stop, alive) = match launched {
            Ok(parts) => parts,
            Err(e) => {
                let reason = format!("{}: {e}", spec.command.program.display());
                warn!(service = %name, error = %reason, "spawn failed");
                self.shared
                    .emit_status(&name, ServiceState::Failed, reason.clone());
                return Err(ServiceError::Spawn {
                    service: name,
                    reason,
                });
            }
        };

        info!(service = %name, pid = ?handle.pid(), kind = ?spec.kind, "service spawned");

        let (reply_tx, reply_rx) = oneshot::channel();
        let monitor = Monitor {
            shared: Arc::clone(&self.shared),
            name: name.clone(),
            run_id,
            strategy,
            stop,
            alive,
            reply: Some(reply_tx),
        };
        let (exit, output) = handle.split();
        tokio::spawn(monitor.run(exit, output));

        match reply_rx.await {
            Ok(Ok(())) => self.state(&name).ok_or_else(|| {
                ServiceError::Internal(format!("{name} vanished from the registry"))
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ServiceError::Internal(format!(
                "monitor for {name} ended without a result"
            ))),
        }
    }

    /// Ask a service to terminate. Does not wait for the exit.
    ///
    /// Idempotent: unknown, exited or already-stopping services are ignored.
    /// Returns whether a termination request was issued.
    pub fn stop(&self, name: &str) -> bool {
        let registry = self.shared.registry();
        match registry.services.get(name) {
            Some(tracked) if tracked.is_alive() && !tracked.stop.is_cancelled() => {
                info!(service = %name, "stop requested");
                tracked.stop.cancel();
                true
            }
            _ => {
                debug!(service = %name, "stop ignored, service not running");
                false
            }
        }
    }

    /// Wait until the named process has exited. Returns `false` on timeout.
    ///
    /// Unknown services count as exited.
    pub async fn wait_for_exit(&self, name: &str, limit: Duration) -> bool {
        let alive = self
            .shared
            .registry()
            .services
            .get(name)
            .map(|t| t.alive.clone());
        let Some(mut alive) = alive else {
            return true;
        };
        matches!(timeout(limit, alive.wait_for(|a| !*a)).await, Ok(_))
    }

    /// Current record of a service.
    pub fn state(&self, name: &str) -> Option<ManagedService> {
        self.shared
            .registry()
            .services
            .get(name)
            .map(|t| t.record.clone())
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.shared.registry().is_alive(name)
    }

    /// Every known service, in start order.
    pub fn services(&self) -> Vec<ManagedService> {
        self.shared
            .registry()
            .ordered()
            .into_iter()
            .map(|t| t.record.clone())
            .collect()
    }

    /// Names of services with a live process, in start order.
    pub fn running(&self) -> Vec<String> {
        self.shared
            .registry()
            .ordered()
            .into_iter()
            .filter(|t| t.is_alive())
            .map(|t| t.record.name.clone())
            .collect()
    }

    /// Recent classified output of a service.
    pub fn logs(&self, name: &str) -> Vec<LogEntry> {
        self.shared.logs.get(name)
    }
}

fn note(service: &str, result: Result<(), InvalidTransition>) {
    if let Err(e) = result {
        warn!(service = %service, error = %e, "ignored state transition");
    }
}

fn describe_exit(code: Option<i32>) -> String {
    code.map_or_else(
        || "terminated by signal".to_string(),
        |c| format!("exit code {c}"),
    )
}

/// Per-process task owning the handle until exit.
struct Monitor {
    shared: Arc<Shared>,
    name: String,
    run_id: u64,
    strategy: Box<dyn ReadinessStrategy>,
    stop: CancellationToken,
    alive: watch::Sender<bool>,
    reply: Option<oneshot::Sender<Result<(), ServiceError>>>,
}

impl Monitor {
    async fn run(mut self, mut exit: ProcessExit, mut output: ProcessOutput) {
        let spawned_at = Instant::now();
        let mut readiness_at = self.strategy.deadline().map(|d| spawned_at + d);
        let mut kill_at: Option<Instant> = None;
        let mut stopping = false;
        let mut output_open = true;
        let stop = self.stop.clone();

        let status = loop {
            tokio::select! {
                biased;

                line = output.next_line(), if output_open => match line {
                    Some(line) => {
                        if let Some(transition) = self.observe(line) {
                            self.settle_alive(transition);
                        }
                    }
                    None => output_open = false,
                },
                status = exit.wait() => break status,
                () = stop.cancelled(), if !stopping => {
                    stopping = true;
                    info!(service = %self.name, "sending termination signal");
                    if let Err(e) = exit.terminate() {
                        warn!(service = %self.name, error = %e, "termination signal failed");
                    }
                    kill_at = Some(Instant::now() + self.shared.settings.termination_grace());
                }
                () = sleep_until(kill_at.unwrap_or(spawned_at)), if kill_at.is_some() => {
                    kill_at = None;
                    warn!(service = %self.name, "still running after termination grace, killing");
                    if let Err(e) = exit.kill() {
                        warn!(service = %self.name, error = %e, "kill failed");
                    }
                }
                // A stop requested before the deadline leaves readiness to the exit path.
                () = sleep_until(readiness_at.unwrap_or(spawned_at)),
                    if readiness_at.is_some() && !stopping =>
                {
                    readiness_at = None;
                    // An exit racing the deadline must not become an optimistic ready.
                    if let Ok(Some(code)) = exit.try_wait() {
                        break Ok(code);
                    }
                    if let Some(transition) = self.strategy.on_timeout(spawned_at.elapsed()) {
                        self.settle_alive(transition);
                    }
                }
            }
        };

        let code = status.unwrap_or_else(|e| {
            warn!(service = %self.name, error = %e, "failed to collect exit status");
            None
        });
        debug!(service = %self.name, code = ?code, "process exited");

        let late_ready = if output_open {
            self.drain(&mut output).await
        } else {
            None
        };

        let transition = self.strategy.on_exit(code).or_else(|| {
            late_ready.map(|line| Transition::Failed {
                kind: FailureKind::Exited { code },
                message: format!(
                    "exited right after reporting ready: {line} ({})",
                    describe_exit(code)
                ),
            })
        });

        match transition {
            Some(Transition::Completed { message }) => {
                self.update(|r| r.mark_exited(code));
                info!(service = %self.name, "completed");
                self.shared
                    .emit_status(&self.name, ServiceState::Exited, message);
                self.reply(Ok(()));
            }
            Some(Transition::Failed { kind, message }) => {
                let message = if stopping && self.reply.is_some() {
                    format!("stopped before becoming ready ({})", describe_exit(code))
                } else {
                    message
                };
                self.fail(kind, message);
                self.update(|r| {
                    r.release(code);
                    Ok(())
                });
            }
            Some(Transition::Ready { .. }) | None => self.exit_after_settled(code, stopping),
        }

        self.alive.send_replace(false);
    }

    /// Read what the pipes still hold after exit, bounded by the drain time.
    ///
    /// Returns the ready line if one shows up, so that a process that died
    /// right after its banner is not reported ready.
    async fn drain(&mut self, output: &mut ProcessOutput) -> Option<String> {
        let mut late_ready = None;
        let drained = timeout(self.shared.settings.output_drain(), async {
            while let Some(line) = output.next_line().await {
                if let Some(Transition::Ready { message }) = self.observe(line) {
                    late_ready = Some(message);
                }
            }
        })
        .await;
        if drained.is_err() {
            debug!(service = %self.name, "output still open after exit, giving up");
        }
        late_ready
    }

    fn observe(&mut self, line: OutputLine) -> Option<Transition> {
        let severity = self.shared.classifier.classify(&line.text, line.origin);
        let event = LogEvent::new(self.name.clone(), line.origin, severity, line.text);
        self.shared.logs.push(&event);
        let transition = self.strategy.observe(&event);
        self.shared.sink.emit(event.into());
        transition
    }

    /// Apply a transition decided while the process is alive.
    fn settle_alive(&mut self, transition: Transition) {
        match transition {
            Transition::Ready { message } => {
                self.update(ManagedService::mark_ready);
                info!(service = %self.name, "ready");
                self.shared
                    .emit_status(&self.name, ServiceState::Ready, message);
                self.reply(Ok(()));
            }
            Transition::Failed { kind, message } => {
                self.fail(kind, message);
                self.stop.cancel();
            }
            Transition::Completed { message } => {
                debug!(service = %self.name, %message, "completion before exit ignored");
            }
        }
    }

    fn fail(&mut self, kind: FailureKind, message: String) {
        self.update(ManagedService::mark_failed);
        warn!(service = %self.name, %message, "service failed");
        self.shared
            .emit_status(&self.name, ServiceState::Failed, message.clone());
        let service = self.name.clone();
        let error = match kind {
            FailureKind::Timeout { waited } => ServiceError::ReadinessTimeout {
                service,
                waited,
                message,
            },
            FailureKind::Exited { code } => ServiceError::UnexpectedExit {
                service,
                code,
                message,
            },
        };
        self.reply(Err(error));
    }

    /// Exit of a process whose readiness was already decided.
    fn exit_after_settled(&mut self, code: Option<i32>, stopping: bool) {
        let state = self.current_state();
        if state != Some(ServiceState::Ready) {
            self.update(|r| {
                r.release(code);
                Ok(())
            });
            debug!(service = %self.name, code = ?code, "failed service exited");
            return;
        }

        self.update(|r| r.mark_exited(code));
        let message = if stopping {
            info!(service = %self.name, code = ?code, "stopped");
            format!("stopped ({})", describe_exit(code))
        } else {
            warn!(service = %self.name, code = ?code, "exited unexpectedly");
            match self.shared.logs.last_error(&self.name) {
                Some(entry) => format!(
                    "exited unexpectedly ({}): {}",
                    describe_exit(code),
                    entry.line
                ),
                None => format!("exited unexpectedly ({})", describe_exit(code)),
            }
        };
        self.shared
            .emit_status(&self.name, ServiceState::Exited, message);
    }

    fn current_state(&self) -> Option<ServiceState> {
        self.shared
            .registry()
            .services
            .get(&self.name)
            .filter(|t| t.run_id == self.run_id)
            .map(|t| t.record.state)
    }

    fn update(&self, apply: impl FnOnce(&mut ManagedService) -> Result<(), InvalidTransition>) {
        let mut registry = self.shared.registry();
        if let Some(tracked) = registry
            .services
            .get_mut(&self.name)
            .filter(|t| t.run_id == self.run_id)
        {
            note(&self.name, apply(&mut tracked.record));
        }
    }

    fn reply(&mut self, result: Result<(), ServiceError>) {
        if let Some(tx) = self.reply.take() {
            let _ = tx.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::NoopSink;

    fn supervisor() -> ServiceSupervisor {
        ServiceSupervisor::new(OrchestratorSettings::with_defaults(), Arc::new(NoopSink::new()))
    }

    #[test]
    fn describe_exit_formats_codes() {
        assert_eq!(describe_exit(Some(2)), "exit code 2");
        assert_eq!(describe_exit(None), "terminated by signal");
    }

    #[tokio::test]
    async fn unknown_services_are_handled_quietly() {
        let sup = supervisor();
        assert!(!sup.stop("nothing"));
        assert!(sup.wait_for_exit("nothing", Duration::from_millis(10)).await);
        assert!(sup.state("nothing").is_none());
        assert!(sup.services().is_empty());
        assert!(sup.logs("nothing").is_empty());
    }

    #[tokio::test]
    async fn spawn_failure_is_recorded() {
        let sup = supervisor();
        let spec = ServiceSpec::one_shot(
            "migrations",
            conductor_core::CommandSpec::new("/no/such/interpreter"),
        );
        let err = sup.start(spec).await.unwrap_err();
        assert!(matches!(err, ServiceError::Spawn { .. }));

        let record = sup.state("migrations").unwrap();
        assert_eq!(record.state, ServiceState::Failed);
        assert!(record.pid.is_none());
        assert!(!sup.is_running("migrations"));
    }
}
