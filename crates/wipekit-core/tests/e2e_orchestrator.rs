//! End-to-end orchestrator integration tests.
//!
//! These tests exercise the real spawn → stream → parse → resolve pipeline
//! against stub engine scripts written into a temporary directory,
//! verifying event delivery, cancellation, timeouts, and the
//! single-operation invariant with zero mocking of the process layer.
//!
//! Unix-only: the stubs are `/bin/sh` scripts. The platform-independent
//! parsing and argument-building logic is covered by unit tests.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use wipekit_core::{
    Orchestrator, OutcomeStatus, StartError, WipeAlgorithm, WipeEvent, WipeRequest,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Write an executable `/bin/sh` stub that plays the role of the engine.
fn stub_engine(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("securewipe-stub");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A regular file that is safe to offer as a wipe target.
fn victim_file(dir: &Path) -> String {
    let path = dir.join("victim.bin");
    fs::write(&path, b"doomed").unwrap();
    path.to_string_lossy().into_owned()
}

fn orchestrator_for(stub: &Path) -> Orchestrator {
    Orchestrator::new().with_binary(stub)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// A clean run must stream its events in order and resolve as Completed.
#[test]
fn successful_wipe_streams_events_and_completes() {
    let tmp = TempDir::new().unwrap();
    let stub = stub_engine(
        tmp.path(),
        concat!(
            "echo '{\"type\":\"start\",\"target\":\"/tmp/x\",\"algorithm\":\"zeros\",\"total_passes\":1,\"total_bytes\":6}'\n",
            "echo '{\"type\":\"progress\",\"pass\":1,\"total_passes\":1,\"bytes_written\":6,\"total_bytes\":6,\"percent\":100.0}'\n",
            "echo '{\"type\":\"complete\",\"duration_secs\":0.01}'",
        ),
    );
    let orch = orchestrator_for(&stub);

    let handle = orch
        .start(WipeRequest::new(victim_file(tmp.path()), WipeAlgorithm::Zeros))
        .expect("start failed");
    let outcome = handle.wait();

    assert_eq!(outcome.status, OutcomeStatus::Completed);
    assert_eq!(outcome.exit_code, Some(0));
    assert!(!orch.is_active());

    let events: Vec<WipeEvent> = handle.events.try_iter().collect();
    assert!(matches!(events[0], WipeEvent::Start { .. }));
    assert!(matches!(events[1], WipeEvent::Progress { .. }));
    assert!(matches!(events[2], WipeEvent::Complete { .. }));
}

/// Demo mode must skip target validation entirely — the bogus target is
/// ignored in favour of a generated temporary name.
#[test]
fn demo_mode_ignores_invalid_target() {
    let tmp = TempDir::new().unwrap();
    let stub = stub_engine(tmp.path(), "echo '{\"type\":\"complete\"}'");
    let orch = orchestrator_for(&stub);

    let mut request = WipeRequest::demo(WipeAlgorithm::Random, 10);
    request.target = "not/even/absolute\0".to_owned();

    let outcome = orch.start(request).expect("demo start failed").wait();
    assert_eq!(outcome.status, OutcomeStatus::Completed);
}

/// An error-kind event fails the operation even when the exit code is 0,
/// and its text becomes the outcome message.
#[test]
fn error_event_overrides_clean_exit() {
    let tmp = TempDir::new().unwrap();
    let stub = stub_engine(
        tmp.path(),
        concat!(
            "echo '{\"type\":\"error\",\"message\":\"device write failed\"}'\n",
            "exit 0",
        ),
    );
    let orch = orchestrator_for(&stub);

    let outcome = orch
        .start(WipeRequest::new(victim_file(tmp.path()), WipeAlgorithm::Random))
        .unwrap()
        .wait();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.message.contains("device write failed"));
}

/// Non-zero exit with stderr text: the fallback message carries the code
/// and the stderr tail is appended.
#[test]
fn nonzero_exit_appends_stderr() {
    let tmp = TempDir::new().unwrap();
    let stub = stub_engine(
        tmp.path(),
        concat!("echo 'cannot open device' >&2\n", "exit 3"),
    );
    let orch = orchestrator_for(&stub);

    let outcome = orch
        .start(WipeRequest::new(victim_file(tmp.path()), WipeAlgorithm::Zeros))
        .unwrap()
        .wait();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.exit_code, Some(3));
    assert!(outcome.message.contains("exited with code 3"));
    assert!(outcome.message.contains("cannot open device"));
}

/// Cancellation must synthesize an informational event, stop the child,
/// and never resolve as success.
#[test]
fn cancel_active_operation_yields_cancelled() {
    let tmp = TempDir::new().unwrap();
    let stub = stub_engine(
        tmp.path(),
        concat!(
            "echo '{\"type\":\"start\",\"target\":\"/tmp/x\",\"algorithm\":\"zeros\",\"total_passes\":1}'\n",
            "exec sleep 30",
        ),
    );
    let orch = orchestrator_for(&stub);

    let handle = orch
        .start(WipeRequest::new(victim_file(tmp.path()), WipeAlgorithm::Zeros))
        .unwrap();

    // Let the child get going before cancelling.
    std::thread::sleep(Duration::from_millis(200));
    assert!(orch.is_active());
    orch.cancel();

    let outcome = handle.wait();
    assert_eq!(outcome.status, OutcomeStatus::Cancelled);
    assert!(!orch.is_active());

    let events: Vec<WipeEvent> = handle.events.try_iter().collect();
    assert!(
        events.iter().any(|ev| matches!(
            ev,
            WipeEvent::Info { message } if message.contains("cancelled")
        )),
        "expected a synthetic cancellation info event, got {events:?}"
    );
}

/// `cancel()` with nothing running is a no-op and leaves the orchestrator idle.
#[test]
fn cancel_when_idle_is_noop() {
    let orch = Orchestrator::new().with_binary("/nonexistent/engine");
    assert!(!orch.is_active());
    orch.cancel();
    assert!(!orch.is_active());
}

/// A second start while one operation is active must be rejected before any
/// spawn attempt, without disturbing the first operation's stream.
#[test]
fn second_start_is_rejected_while_active() {
    let tmp = TempDir::new().unwrap();
    let stub = stub_engine(
        tmp.path(),
        concat!(
            "echo '{\"type\":\"start\",\"target\":\"/tmp/x\",\"algorithm\":\"zeros\",\"total_passes\":1}'\n",
            "exec sleep 30",
        ),
    );
    let orch = orchestrator_for(&stub);
    let target = victim_file(tmp.path());

    let handle = orch
        .start(WipeRequest::new(target.clone(), WipeAlgorithm::Zeros))
        .unwrap();
    std::thread::sleep(Duration::from_millis(200));

    match orch.start(WipeRequest::new(target, WipeAlgorithm::Zeros)) {
        Err(StartError::AlreadyRunning) => {}
        Err(other) => panic!("expected AlreadyRunning, got {other:?}"),
        Ok(_) => panic!("expected AlreadyRunning, got a second handle"),
    }

    // First operation is untouched and still cancellable.
    assert!(orch.is_active());
    orch.cancel();
    let outcome = handle.wait();
    assert_eq!(outcome.status, OutcomeStatus::Cancelled);
}

/// The wall-clock timeout must kill the child and resolve as TimedOut,
/// carrying the configured value in the message.
#[test]
fn timeout_kills_child_and_reports_timed_out() {
    let tmp = TempDir::new().unwrap();
    let stub = stub_engine(tmp.path(), "exec sleep 30");
    let orch = orchestrator_for(&stub).with_timeout(Duration::from_millis(300));

    let outcome = orch
        .start(WipeRequest::new(victim_file(tmp.path()), WipeAlgorithm::Zeros))
        .unwrap()
        .wait();

    assert_eq!(outcome.status, OutcomeStatus::TimedOut);
    assert!(outcome.message.contains("timed out"));
    assert!(!orch.is_active());
}

/// Drive listing runs the reduced argument vector and returns the single
/// classified payload.
#[test]
fn list_drives_returns_payload() {
    let tmp = TempDir::new().unwrap();
    let stub = stub_engine(
        tmp.path(),
        concat!(
            "echo '{\"type\":\"drive_list\",\"drives\":[",
            "{\"device\":\"/dev/sda\",\"model\":\"Test SSD\",\"size_bytes\":1000,\"removable\":false}]}'",
        ),
    );
    let orch = orchestrator_for(&stub);

    let drives = orch.list_drives().expect("list_drives failed");
    assert_eq!(drives.len(), 1);
    assert_eq!(drives[0].device, "/dev/sda");
    assert_eq!(drives[0].model.as_deref(), Some("Test SSD"));
    assert!(!orch.is_active());
}

/// The flat system payload (no discriminator) must classify as SystemInfo.
#[test]
fn system_info_classifies_flat_payload() {
    let tmp = TempDir::new().unwrap();
    let stub = stub_engine(
        tmp.path(),
        "echo '{\"os_name\":\"Linux\",\"os_version\":\"6.8\",\"architecture\":\"x86_64\"}'",
    );
    let orch = orchestrator_for(&stub);

    let report = orch.system_info().expect("system_info failed");
    assert_eq!(report.os_name, "Linux");
    assert_eq!(report.architecture, "x86_64");
}

/// A missing engine binary is a start error, not an outcome.
#[test]
fn missing_binary_is_a_start_error() {
    let tmp = TempDir::new().unwrap();
    let orch = Orchestrator::new().with_binary("/nonexistent/securewipe");

    match orch.start(WipeRequest::new(victim_file(tmp.path()), WipeAlgorithm::Zeros)) {
        Err(StartError::BinaryNotFound(_)) => {}
        Err(other) => panic!("expected BinaryNotFound, got {other:?}"),
        Ok(_) => panic!("expected BinaryNotFound, got a handle"),
    }
    assert!(!orch.is_active());
}

/// Validation failures are raised before any process is spawned.
#[test]
fn invalid_target_is_rejected_before_spawn() {
    let tmp = TempDir::new().unwrap();
    let stub = stub_engine(tmp.path(), "echo should-never-run");
    let orch = orchestrator_for(&stub);

    let missing = tmp.path().join("never-created.bin");
    match orch.start(WipeRequest::new(
        missing.to_string_lossy().into_owned(),
        WipeAlgorithm::Zeros,
    )) {
        Err(StartError::Validation(_)) => {}
        Err(other) => panic!("expected a validation error, got {other:?}"),
        Ok(_) => panic!("expected a validation error, got a handle"),
    }
    assert!(!orch.is_active());
}

/// Out-of-range tuning values are rejected up front.
#[test]
fn bad_pass_count_and_buffer_size_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let stub = stub_engine(tmp.path(), "echo should-never-run");
    let orch = orchestrator_for(&stub);
    let target = victim_file(tmp.path());

    let mut request = WipeRequest::new(target.clone(), WipeAlgorithm::Zeros);
    request.passes = Some(101);
    assert!(matches!(
        orch.start(request),
        Err(StartError::InvalidPassCount(101))
    ));

    let mut request = WipeRequest::new(target, WipeAlgorithm::Zeros);
    request.buffer_size_kb = Some(0);
    assert!(matches!(
        orch.start(request),
        Err(StartError::InvalidBufferSize)
    ));
    assert!(!orch.is_active());
}

/// Malformed stdout spans are skipped; the stream and outcome survive.
#[test]
fn malformed_event_does_not_abort_the_stream() {
    let tmp = TempDir::new().unwrap();
    let stub = stub_engine(
        tmp.path(),
        concat!(
            "echo '{this is not json}'\n",
            "echo 'plain noise line'\n",
            "echo '{\"type\":\"complete\"}'",
        ),
    );
    let orch = orchestrator_for(&stub);

    let handle = orch
        .start(WipeRequest::new(victim_file(tmp.path()), WipeAlgorithm::Zeros))
        .unwrap();
    let outcome = handle.wait();

    assert_eq!(outcome.status, OutcomeStatus::Completed);
    let events: Vec<WipeEvent> = handle.events.try_iter().collect();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], WipeEvent::Complete { .. }));
}

/// A consumer that stops draining its event channel must not suspend
/// supervision — the wall-clock timeout still fires and resolves the run.
#[test]
fn stalled_consumer_does_not_block_supervision() {
    let tmp = TempDir::new().unwrap();
    let stub = stub_engine(
        tmp.path(),
        concat!(
            "i=0\n",
            "while [ $i -lt 100 ]; do\n",
            "  echo '{\"type\":\"info\",\"message\":\"tick\"}'\n",
            "  i=$((i+1))\n",
            "done\n",
            "exec sleep 30",
        ),
    );
    let orch = orchestrator_for(&stub).with_timeout(Duration::from_millis(300));

    // Capacity 1 and never drained: the sink fills immediately.
    let (tx, rx) = crossbeam_channel::bounded(1);
    let outcome_rx = orch
        .start_with_sink(
            WipeRequest::new(victim_file(tmp.path()), WipeAlgorithm::Zeros),
            tx,
        )
        .unwrap();

    let outcome = outcome_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("supervision stalled behind a full event channel");
    assert_eq!(outcome.status, OutcomeStatus::TimedOut);
    assert!(!orch.is_active());
    drop(rx);
}

/// A multi-byte character split across two pipe reads must survive intact.
#[test]
fn event_text_survives_chunk_split_inside_a_character() {
    let tmp = TempDir::new().unwrap();
    // stdbuf-free approximation: two writes with a pause between them force
    // separate pipe reads, cutting inside the two-byte 'ä'.
    let stub = stub_engine(
        tmp.path(),
        concat!(
            "printf '{\"type\":\"info\",\"message\":\"l\\303'\n",
            "sleep 0.2\n",
            "printf '\\244uft\"}\\n'\n",
            "echo '{\"type\":\"complete\"}'",
        ),
    );
    let orch = orchestrator_for(&stub);

    let handle = orch
        .start(WipeRequest::new(victim_file(tmp.path()), WipeAlgorithm::Zeros))
        .unwrap();
    let outcome = handle.wait();
    assert_eq!(outcome.status, OutcomeStatus::Completed);

    let events: Vec<WipeEvent> = handle.events.try_iter().collect();
    assert!(
        events.iter().any(|ev| matches!(
            ev,
            WipeEvent::Info { message } if message == "läuft"
        )),
        "expected an intact UTF-8 payload, got {events:?}"
    );
}

/// Back-to-back operations on one orchestrator must work once the previous
/// handle resolves.
#[test]
fn sequential_operations_reuse_the_orchestrator() {
    let tmp = TempDir::new().unwrap();
    let stub = stub_engine(tmp.path(), "echo '{\"type\":\"complete\"}'");
    let orch = orchestrator_for(&stub);
    let target = victim_file(tmp.path());

    for _ in 0..3 {
        let outcome = orch
            .start(WipeRequest::new(target.clone(), WipeAlgorithm::Zeros))
            .expect("sequential start failed")
            .wait();
        assert_eq!(outcome.status, OutcomeStatus::Completed);
        assert!(!orch.is_active());
    }
}
