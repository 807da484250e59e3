//! End-to-end checks: the test process registers a dump for a signal, then
//! checks itself by pid. Each test owns a distinct signal.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::layer::SubscriberExt;
use tracing_tally::{
    check_dump, CheckOptions, CheckOutcome, CounterLayer, DumpChecker, DumpConfig, DumpFormat,
    DumpSnapshot, KillSignaller, LogRecord, Severity, Signal, SystemClock, TallyConfig,
    ThresholdRule,
};

fn checker() -> DumpChecker {
    DumpChecker::new(Arc::new(KillSignaller), Arc::new(SystemClock::new())).with_options(
        CheckOptions {
            attempts: 80,
            interval: Duration::from_millis(25),
        },
    )
}

fn rules(sources: &[&str]) -> Vec<ThresholdRule> {
    sources.iter().map(|s| s.parse().unwrap()).collect()
}

fn check(path: &Path, signal: Signal, sources: &[&str]) -> CheckOutcome {
    checker()
        .check(std::process::id(), path, signal, &rules(sources))
        .unwrap()
}

#[test]
fn test_no_rules_passes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump.json");
    let counter = CounterLayer::new();
    let _registration = counter
        .dump_on_signal(DumpConfig::new(&path).with_signal(Signal::USR1))
        .unwrap();

    let outcome = check(&path, Signal::USR1, &[]);
    assert_eq!(outcome, CheckOutcome::Passed);
    assert_eq!(outcome.exit_code(), 0);
    assert!(path.exists());
}

#[test]
fn test_wrong_path_is_unresponsive() {
    let dir = tempfile::tempdir().unwrap();
    let counter = CounterLayer::new();
    let _registration = counter
        .dump_on_signal(DumpConfig::new(dir.path().join("real.json")).with_signal(Signal::HUP))
        .unwrap();

    let elsewhere = dir.path().join("elsewhere.json");
    let outcome = DumpChecker::new(Arc::new(KillSignaller), Arc::new(SystemClock::new()))
        .with_options(CheckOptions {
            attempts: 4,
            interval: Duration::from_millis(25),
        })
        .check(std::process::id(), &elsewhere, Signal::HUP, &[])
        .unwrap();

    assert!(matches!(outcome, CheckOutcome::Unresponsive { .. }));
    assert_eq!(outcome.exit_code(), 2);
}

#[test]
fn test_count_rules() {
    let dir = tempfile::tempdir().unwrap();
    let counter = CounterLayer::new();
    let _registration = counter
        .dump_on_signal(DumpConfig::new(dir.path().join("dump.json")).with_signal(Signal::USR2))
        .unwrap();

    // Nothing tallied yet
    let path = dir.path().join("dump.json");
    let outcome = check(&path, Signal::USR2, &["info count gt 2"]);
    assert_eq!(outcome.exit_code(), 3);

    for _ in 0..3 {
        counter.intake(&LogRecord::new(Severity::INFO, "Hello"));
    }
    std::thread::sleep(Duration::from_millis(10));

    let outcome = check(&path, Signal::USR2, &["info count gt 2", "ANY count lt 1"]);
    match &outcome {
        CheckOutcome::RuleViolated {
            index, observed, ..
        } => {
            assert_eq!(*index, 1);
            assert_eq!(*observed, 3.0);
        }
        other => panic!("expected a violated rule, got {:?}", other),
    }
    assert_eq!(outcome.exit_code(), 4);
}

#[test]
fn test_last_record_rules_with_text_dump() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump.txt");
    let counter = CounterLayer::new();
    let _registration = counter
        .dump_on_signal(
            DumpConfig::new(&path)
                .with_signal(Signal::WINCH)
                .with_format(DumpFormat::Text),
        )
        .unwrap();

    counter.intake(&LogRecord::new(Severity::ERROR, "recent"));

    let outcome = check(
        &path,
        Signal::WINCH,
        &["ERROR last_record gt -60", "ANY last_record lt 1"],
    );
    assert_eq!(outcome, CheckOutcome::Passed);

    std::thread::sleep(Duration::from_millis(10));
    let outcome = check(&path, Signal::WINCH, &["ERROR last_record lt -60"]);
    assert_eq!(outcome.exit_code(), 3);
}

#[test]
fn test_check_dump_with_default_polling() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump.json");
    let signal: Signal = "SIGURG".parse().unwrap();
    let counter = CounterLayer::new();
    let _registration = counter
        .dump_on_signal(DumpConfig::new(&path).with_signal(signal))
        .unwrap();
    counter.intake(&LogRecord::exception("Io", "broken pipe", "write failed"));

    let rules = rules(&["exception count gt 0", "exception count lt 1"]);
    let outcome = check_dump(std::process::id(), &path, signal, &rules).unwrap();

    assert_eq!(outcome.exit_code(), 4);
    assert_eq!(
        outcome.to_string(),
        "Error in rule 'exception count lt 1' EXCEPTION count = 1"
    );
}

#[test]
fn test_dump_registered_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("configured.txt");
    let json = format!(
        r#"{{"dump": {{"path": {}, "signal": "alrm", "format": "text"}}}}"#,
        serde_json::to_string(&path).unwrap()
    );
    let setup = TallyConfig::from_json(&json).unwrap().build().unwrap();
    let registration = setup.registration.as_ref().unwrap();
    assert!(registration.is_active());
    assert_eq!(registration.signal(), Signal::ALRM);

    let subscriber = tracing_subscriber::registry().with(setup.counter.clone());
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!("up");
        tracing::error!(severity = 50, "disk full");
    });

    let rc = unsafe { libc::kill(libc::getpid(), libc::SIGALRM) };
    assert_eq!(rc, 0);

    let deadline = Instant::now() + Duration::from_secs(5);
    let content = loop {
        if let Ok(content) = std::fs::read_to_string(&path) {
            break content;
        }
        assert!(Instant::now() < deadline, "no dump at {}", path.display());
        std::thread::sleep(Duration::from_millis(10));
    };

    let labels: Vec<&str> = content
        .lines()
        .filter_map(|line| line.split(' ').next())
        .collect();
    assert_eq!(labels, vec!["FATAL", "INFO"]);
    let snapshot = DumpSnapshot::parse(&content).unwrap();
    assert_eq!(snapshot.count_of("FATAL"), 1);
    assert_eq!(snapshot.count_of("INFO"), 1);
}
