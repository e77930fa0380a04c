//! Exhaustive checks of readiness strategies over recorded line sequences.

use std::time::Duration;

use conductor_core::readiness::{
    DEFAULT_WEB_READY_PHRASES, DEFAULT_WORKER_READY_PHRASES, HybridStrategy,
    OutputSignaledStrategy,
};
use conductor_core::{
    LogEvent, ReadinessPolicy, ReadinessStrategy, StreamOrigin, Transition, classify,
};

const CORPUS: &[(&str, StreamOrigin)] = &[
    ("Operations to perform:", StreamOrigin::Stdout),
    ("  Applying auth.0001_initial... OK", StreamOrigin::Stdout),
    ("Watching for file changes with StatReloader", StreamOrigin::Stderr),
    ("Performing system checks...", StreamOrigin::Stderr),
    ("Starting development server at http://127.0.0.1:8000/", StreamOrigin::Stderr),
    ("14:02:11 *** Listening on default...", StreamOrigin::Stderr),
    ("Traceback (most recent call last):", StreamOrigin::Stderr),
    ("WARNING: pip is out of date", StreamOrigin::Stdout),
    ("Successfully installed django", StreamOrigin::Stdout),
    ("", StreamOrigin::Stdout),
];

const QUIET_CORPUS: &[(&str, StreamOrigin)] = &[
    ("Operations to perform:", StreamOrigin::Stdout),
    ("Performing system checks...", StreamOrigin::Stderr),
    ("Traceback (most recent call last):", StreamOrigin::Stderr),
    ("plain stderr noise", StreamOrigin::Stderr),
];

const EXIT_CODES: &[Option<i32>] = &[Some(0), Some(1), Some(137), None];

fn event(service: &str, (text, origin): (&str, StreamOrigin)) -> LogEvent {
    LogEvent::new(service, origin, classify(text, origin), text)
}

/// Every sequence of `len` lines drawn from `corpus`.
fn sequences(
    corpus: &[(&'static str, StreamOrigin)],
    len: usize,
) -> Vec<Vec<(&'static str, StreamOrigin)>> {
    let mut out = vec![Vec::new()];
    for _ in 0..len {
        let mut next = Vec::with_capacity(out.len() * corpus.len());
        for prefix in &out {
            for item in corpus {
                let mut seq = prefix.clone();
                seq.push(*item);
                next.push(seq);
            }
        }
        out.extend(next);
    }
    out
}

fn run(
    strategy: &mut dyn ReadinessStrategy,
    service: &str,
    lines: &[(&str, StreamOrigin)],
) -> Vec<Transition> {
    lines
        .iter()
        .filter_map(|line| strategy.observe(&event(service, *line)))
        .collect()
}

#[test]
fn one_shot_never_reports_ready() {
    for seq in sequences(CORPUS, 3) {
        for code in EXIT_CODES {
            let mut strategy = ReadinessPolicy::OneShot.build();
            let mut transitions = run(strategy.as_mut(), "migrations", &seq);
            transitions.extend(strategy.on_timeout(Duration::from_secs(3600)));
            transitions.extend(strategy.on_exit(*code));

            assert!(
                transitions.iter().all(|t| !t.is_ready()),
                "ready for {seq:?} / {code:?}"
            );
            assert_eq!(transitions.len(), 1);
            let completed = matches!(transitions[0], Transition::Completed { .. });
            assert_eq!(completed, *code == Some(0));
        }
    }
}

#[test]
fn one_shot_failure_names_the_last_line() {
    for seq in sequences(QUIET_CORPUS, 2) {
        let Some(last) = seq.iter().rev().map(|(t, _)| *t).find(|t| !t.is_empty()) else {
            continue;
        };
        let mut strategy = ReadinessPolicy::OneShot.build();
        run(strategy.as_mut(), "migrations", &seq);
        let transition = strategy.on_exit(Some(1)).unwrap();
        let has_error_line = seq.iter().any(|(t, _)| t.starts_with("Traceback"));
        if !has_error_line {
            assert!(transition.message().contains(last), "{seq:?}");
        }
    }
}

#[test]
fn output_signaled_exit_before_phrase_fails() {
    for seq in sequences(QUIET_CORPUS, 3) {
        for code in EXIT_CODES {
            let mut strategy = OutputSignaledStrategy::new(DEFAULT_WEB_READY_PHRASES, None);
            let mut transitions = run(&mut strategy, "web-server", &seq);
            transitions.extend(strategy.on_exit(*code));

            assert_eq!(transitions.len(), 1, "{seq:?}");
            assert!(matches!(transitions[0], Transition::Failed { .. }));
        }
    }
}

#[test]
fn output_signaled_ready_at_most_once() {
    for seq in sequences(CORPUS, 3) {
        let mut strategy = OutputSignaledStrategy::new(DEFAULT_WEB_READY_PHRASES, None);
        let transitions = run(&mut strategy, "web-server", &seq);
        let ready = transitions.iter().filter(|t| t.is_ready()).count();
        let expected = usize::from(
            seq.iter()
                .any(|(t, _)| t.starts_with("Starting development server")),
        );
        assert_eq!(ready, expected, "{seq:?}");
    }
}

#[test]
fn hybrid_silent_worker_ready_exactly_once_after_grace() {
    let grace = Duration::from_millis(3000);
    for seq in sequences(QUIET_CORPUS, 2) {
        let mut strategy = HybridStrategy::new(DEFAULT_WORKER_READY_PHRASES, grace);
        let mut transitions = run(&mut strategy, "job-worker", &seq);
        assert!(transitions.is_empty());

        for ms in [0, 1000, 2999] {
            assert!(strategy.on_timeout(Duration::from_millis(ms)).is_none());
        }
        transitions.extend(strategy.on_timeout(grace));
        transitions.extend(strategy.on_timeout(grace * 2));
        transitions.extend(strategy.on_exit(Some(0)));

        assert_eq!(transitions.len(), 1);
        assert!(transitions[0].is_ready());
    }
}

#[test]
fn hybrid_exit_during_grace_is_never_ready() {
    let grace = Duration::from_millis(3000);
    for seq in sequences(QUIET_CORPUS, 2) {
        for code in EXIT_CODES {
            let mut strategy = HybridStrategy::new(DEFAULT_WORKER_READY_PHRASES, grace);
            run(&mut strategy, "job-worker", &seq);
            assert!(strategy.on_timeout(Duration::from_millis(1500)).is_none());
            let exit = strategy.on_exit(*code).unwrap();
            assert!(matches!(exit, Transition::Failed { .. }));
            assert!(strategy.on_timeout(grace).is_none());
        }
    }
}
