//! End-to-end supervision of real `sh` processes.

#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{RecordingSink, TEST_WAIT, fast_settings, sh, supervisor};
use conductor_core::domain::plan::{JOB_WORKER, WEB_SERVER};
use conductor_core::{
    OrchestratorSettings, ReadinessPolicy, ServiceError, ServiceSpec, ServiceState,
};
use conductor_runtime::{ServiceSupervisor, ShutdownCoordinator, ShutdownReport};
use tokio::time::{Instant, timeout};
use tokio_test::assert_ok;

#[tokio::test]
async fn one_shot_success_ends_exited_without_ready() {
    let sink = RecordingSink::default();
    let sup = supervisor(&sink);

    let spec = ServiceSpec::one_shot(
        "migrations",
        sh("echo 'Operations to perform:'; echo 'Applying auth.0001_initial... OK'; exit 0"),
    );
    let record = assert_ok!(sup.start(spec).await);

    assert_eq!(record.state, ServiceState::Exited);
    assert_eq!(record.exit_code, Some(0));
    assert!(record.pid.is_none());
    assert!(record.ready_at.is_none());
    assert_eq!(
        sink.states("migrations"),
        [ServiceState::Starting, ServiceState::Exited]
    );
    assert!(!sup.is_running("migrations"));
}

#[tokio::test]
async fn one_shot_failure_reports_last_error_line() {
    let sink = RecordingSink::default();
    let sup = supervisor(&sink);

    let spec = ServiceSpec::one_shot(
        "migrations",
        sh("echo 'Operations to perform:'; \
            echo 'django.db.utils.OperationalError: no such table: auth_user' 1>&2; \
            exit 1"),
    );
    let err = sup.start(spec).await.unwrap_err();

    match &err {
        ServiceError::UnexpectedExit { code, message, .. } => {
            assert_eq!(*code, Some(1));
            assert!(message.contains("no such table"), "message: {message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(sup.state("migrations").unwrap().state, ServiceState::Failed);

    let failed = sink.statuses("migrations").pop().unwrap();
    assert_eq!(failed.state, ServiceState::Failed);
    assert_eq!(failed.message, err.message());
}

#[tokio::test]
async fn web_server_ready_on_banner_exactly_once() {
    let sink = RecordingSink::default();
    let sup = supervisor(&sink);

    let spec = ServiceSpec::long_running(
        WEB_SERVER,
        sh("echo 'Watching for file changes with StatReloader'; \
            echo 'Starting development server at http://127.0.0.1:8000/'; \
            echo 'Starting development server at http://127.0.0.1:8000/'; \
            exec sleep 30"),
        ReadinessPolicy::web_server(None),
    );
    let record = assert_ok!(timeout(TEST_WAIT, sup.start(spec)).await.unwrap());
    assert_eq!(record.state, ServiceState::Ready);
    assert!(record.pid.is_some());
    assert!(sup.is_running(WEB_SERVER));

    assert!(sup.stop(WEB_SERVER));
    assert!(sup.wait_for_exit(WEB_SERVER, TEST_WAIT).await);

    let ready = sink
        .states(WEB_SERVER)
        .into_iter()
        .filter(|s| *s == ServiceState::Ready)
        .count();
    assert_eq!(ready, 1);

    let last = sink.statuses(WEB_SERVER).pop().unwrap();
    assert_eq!(last.state, ServiceState::Exited);
    assert!(last.message.starts_with("stopped"), "message: {}", last.message);
}

#[tokio::test]
async fn silent_worker_is_ready_after_grace() {
    let sink = RecordingSink::default();
    let sup = supervisor(&sink);

    let spec = ServiceSpec::long_running(
        JOB_WORKER,
        sh("exec sleep 30"),
        ReadinessPolicy::job_worker(3000),
    );
    let started = Instant::now();
    let record = assert_ok!(timeout(TEST_WAIT, sup.start(spec)).await.unwrap());

    assert!(started.elapsed() >= Duration::from_millis(3000));
    assert_eq!(record.state, ServiceState::Ready);
    let ready = sink.statuses(JOB_WORKER).pop().unwrap();
    assert!(ready.message.contains("assuming ready"), "message: {}", ready.message);

    sup.stop(JOB_WORKER);
    assert!(sup.wait_for_exit(JOB_WORKER, TEST_WAIT).await);
}

#[tokio::test]
async fn worker_banner_beats_grace_window() {
    let sink = RecordingSink::default();
    let sup = supervisor(&sink);

    let spec = ServiceSpec::long_running(
        JOB_WORKER,
        sh("echo '*** Listening on default...'; exec sleep 30"),
        ReadinessPolicy::job_worker(3000),
    );
    let started = Instant::now();
    assert_ok!(sup.start(spec).await);
    assert!(started.elapsed() < Duration::from_millis(3000));

    sup.stop(JOB_WORKER);
    assert!(sup.wait_for_exit(JOB_WORKER, TEST_WAIT).await);
}

#[tokio::test]
async fn worker_exiting_during_grace_fails() {
    let sink = RecordingSink::default();
    let sup = supervisor(&sink);

    let spec = ServiceSpec::long_running(
        JOB_WORKER,
        sh("echo 'Error: Redis connection refused' 1>&2; exit 3"),
        ReadinessPolicy::job_worker(3000),
    );
    let err = sup.start(spec).await.unwrap_err();

    assert!(matches!(err, ServiceError::UnexpectedExit { code: Some(3), .. }));
    assert!(!sink.states(JOB_WORKER).contains(&ServiceState::Ready));
    assert_eq!(sup.state(JOB_WORKER).unwrap().state, ServiceState::Failed);
}

#[tokio::test]
async fn stop_during_grace_window_is_not_ready() {
    let sink = RecordingSink::default();
    let settings = OrchestratorSettings {
        termination_grace_ms: 3000,
        ..fast_settings()
    };
    let sup = ServiceSupervisor::new(settings, Arc::new(sink.clone()));

    // Ignores SIGTERM, so it is still alive when the grace window closes.
    let spec = ServiceSpec::long_running(
        JOB_WORKER,
        sh("trap '' TERM; sleep 2"),
        ReadinessPolicy::job_worker(500),
    );
    let starter = sup.clone();
    let start = tokio::spawn(async move { starter.start(spec).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(sup.stop(JOB_WORKER));

    let err = timeout(TEST_WAIT, start).await.unwrap().unwrap().unwrap_err();
    assert!(matches!(err, ServiceError::UnexpectedExit { .. }));
    let message = err.message();
    assert!(message.contains("stopped before becoming ready"), "message: {message}");
    assert!(!sink.states(JOB_WORKER).contains(&ServiceState::Ready));
    assert_eq!(sup.state(JOB_WORKER).unwrap().state, ServiceState::Failed);
}

#[tokio::test]
async fn web_server_exit_before_banner_fails() {
    let sink = RecordingSink::default();
    let sup = supervisor(&sink);

    let spec = ServiceSpec::long_running(
        WEB_SERVER,
        sh("echo 'Traceback (most recent call last):' 1>&2; exit 1"),
        ReadinessPolicy::web_server(None),
    );
    let err = sup.start(spec).await.unwrap_err();
    assert!(matches!(err, ServiceError::UnexpectedExit { .. }));
    assert!(err.message().contains("Traceback"));
}

#[tokio::test]
async fn exit_after_ready_is_reported_as_exited() {
    let sink = RecordingSink::default();
    let sup = supervisor(&sink);

    let spec = ServiceSpec::long_running(
        WEB_SERVER,
        sh("echo 'Starting development server at http://127.0.0.1:8000/'; \
            sleep 0.3; \
            echo 'Error: port pool exhausted' 1>&2; \
            exit 2"),
        ReadinessPolicy::web_server(None),
    );
    assert_ok!(sup.start(spec).await);
    assert!(sup.wait_for_exit(WEB_SERVER, TEST_WAIT).await);

    let record = sup.state(WEB_SERVER).unwrap();
    assert_eq!(record.state, ServiceState::Exited);
    assert_eq!(record.exit_code, Some(2));

    let last = sink.statuses(WEB_SERVER).pop().unwrap();
    assert_eq!(last.state, ServiceState::Exited);
    assert!(last.message.contains("exited unexpectedly"));
    assert!(last.message.contains("port pool exhausted"));
}

#[tokio::test]
async fn stop_is_idempotent() {
    let sink = RecordingSink::default();
    let sup = supervisor(&sink);

    let spec = ServiceSpec::long_running(
        JOB_WORKER,
        sh("echo 'Worker started'; exec sleep 30"),
        ReadinessPolicy::job_worker(3000),
    );
    assert_ok!(sup.start(spec).await);

    assert!(sup.stop(JOB_WORKER));
    assert!(!sup.stop(JOB_WORKER));
    assert!(sup.wait_for_exit(JOB_WORKER, TEST_WAIT).await);
    assert!(!sup.stop(JOB_WORKER));
    assert!(!sup.is_running(JOB_WORKER));
}

#[tokio::test]
async fn starting_a_running_service_is_refused() {
    let sink = RecordingSink::default();
    let sup = supervisor(&sink);

    let spec = ServiceSpec::long_running(
        JOB_WORKER,
        sh("echo 'Worker started'; exec sleep 30"),
        ReadinessPolicy::job_worker(3000),
    );
    assert_ok!(sup.start(spec.clone()).await);

    let err = sup.start(spec.clone()).await.unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyRunning(name) if name == JOB_WORKER));

    sup.stop(JOB_WORKER);
    assert!(sup.wait_for_exit(JOB_WORKER, TEST_WAIT).await);

    // The name is free again once the process is gone.
    assert_ok!(sup.start(spec).await);
    sup.stop(JOB_WORKER);
    assert!(sup.wait_for_exit(JOB_WORKER, TEST_WAIT).await);
}

#[tokio::test]
async fn readiness_timeout_terminates_the_process() {
    let sink = RecordingSink::default();
    let sup = supervisor(&sink);

    let spec = ServiceSpec::long_running(
        WEB_SERVER,
        sh("echo 'Performing system checks...'; exec sleep 30"),
        ReadinessPolicy::web_server(Some(1000)),
    );
    let err = sup.start(spec).await.unwrap_err();
    assert!(matches!(err, ServiceError::ReadinessTimeout { .. }));

    assert!(sup.wait_for_exit(WEB_SERVER, TEST_WAIT).await);
    let record = sup.state(WEB_SERVER).unwrap();
    assert_eq!(record.state, ServiceState::Failed);
    assert!(record.pid.is_none());
}

#[tokio::test]
async fn logs_keep_classified_output() {
    let sink = RecordingSink::default();
    let sup = supervisor(&sink);

    let spec = ServiceSpec::one_shot(
        "static-files",
        sh("echo '128 static files copied.'; echo 'WARNING: missing manifest entry' 1>&2"),
    );
    assert_ok!(sup.start(spec).await);

    let logs = sup.logs("static-files");
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().any(|e| e.line.contains("128 static files")));
}

#[tokio::test]
async fn shutdown_stops_worker_before_web_server() {
    let sink = RecordingSink::default();
    let sup = supervisor(&sink);

    assert_ok!(
        sup.start(ServiceSpec::long_running(
            WEB_SERVER,
            sh("echo 'Starting development server at http://127.0.0.1:8000/'; exec sleep 30"),
            ReadinessPolicy::web_server(None),
        ))
        .await
    );
    assert_ok!(
        sup.start(ServiceSpec::long_running(
            JOB_WORKER,
            sh("echo 'Worker started'; exec sleep 30"),
            ReadinessPolicy::job_worker(3000),
        ))
        .await
    );
    assert_ok!(
        sup.start(ServiceSpec::long_running(
            "scheduler",
            sh("echo 'Worker started'; exec sleep 30"),
            ReadinessPolicy::job_worker(3000),
        ))
        .await
    );

    let coordinator = ShutdownCoordinator::new(sup.clone());
    assert_eq!(
        coordinator.shutdown_order(),
        [JOB_WORKER, WEB_SERVER, "scheduler"]
    );

    let report = coordinator.shutdown().await;
    assert!(report.is_clean());
    assert_eq!(report.stopped, [JOB_WORKER, WEB_SERVER, "scheduler"]);
    assert!(sup.running().is_empty());

    // A second pass has nothing left to do.
    assert_eq!(coordinator.shutdown().await, ShutdownReport::default());
}
