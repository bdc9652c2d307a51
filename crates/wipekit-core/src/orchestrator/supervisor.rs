/// Child-process supervision loop.
///
/// Runs on a dedicated named thread per operation. Spawns the engine with
/// piped stdio, pumps stdout chunks through the incremental parser, forwards
/// every parsed event to the caller's sink, and enforces cancellation, the
/// grace-kill window, and the wall-clock timeout. Exactly one outcome is
/// resolved per run, after the child has exited or been killed.
use crate::model::{WipeEvent, WipeOutcome};
use crate::parser::EventParser;
use crate::platform::ElevationMethod;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use parking_lot::Mutex;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::ActiveOperation;

/// How long a single event send may wait on a full sink before the event is
/// dropped. Bounded so a stalled consumer cannot suspend cancel/timeout
/// enforcement.
const SEND_PATIENCE: Duration = Duration::from_millis(10);

/// Everything one supervision run needs, handed to the supervisor thread.
pub(crate) struct Supervision {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Mechanism the spawn runs under; recorded in the outcome.
    pub mechanism: ElevationMethod,
    pub timeout: Duration,
    /// How long after a graceful stop request before the forceful kill.
    pub grace: Duration,
    pub cancel: Arc<AtomicBool>,
    pub events: Sender<WipeEvent>,
    pub outcome: Sender<WipeOutcome>,
    /// The orchestrator's single handle slot; cleared when this run ends.
    pub slot: Arc<Mutex<Option<ActiveOperation>>>,
}

/// Tracks the stop-related state of one run.
struct StopState {
    deadline: Instant,
    cancelled: bool,
    grace_deadline: Option<Instant>,
    timed_out: bool,
    force_killed: bool,
}

pub(crate) fn run(sv: Supervision) {
    let outcome = supervise(&sv);
    // Clear the handle slot before publishing the outcome so `is_active()`
    // is already false when the caller observes the result.
    *sv.slot.lock() = None;
    let _ = sv.outcome.send(outcome);
}

fn supervise(sv: &Supervision) -> WipeOutcome {
    info!(
        "spawning {} {}",
        sv.program.display(),
        sv.args.join(" ")
    );

    let mut child = match Command::new(&sv.program)
        .args(&sv.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            warn!("failed to launch {}: {err}", sv.program.display());
            return WipeOutcome::failed(
                None,
                format!("failed to launch wipe process: {err}"),
                sv.mechanism,
            );
        }
    };
    let pid = child.id();
    debug!("child pid {pid}");

    let chunk_rx = spawn_stdout_reader(&mut child);
    let stderr_handle = spawn_stderr_reader(&mut child);

    let mut parser = EventParser::new();
    let mut last_error: Option<String> = None;
    let mut dropped_events: u64 = 0;
    let mut stop = StopState {
        deadline: Instant::now() + sv.timeout,
        cancelled: false,
        grace_deadline: None,
        timed_out: false,
        force_killed: false,
    };

    // Stream until stdout EOF, checking control state between chunks.
    let ticker = crossbeam_channel::tick(Duration::from_millis(50));
    loop {
        crossbeam_channel::select! {
            recv(chunk_rx) -> msg => match msg {
                Ok(chunk) => {
                    for event in parser.push_bytes(&chunk) {
                        if let WipeEvent::Error { message } = &event {
                            last_error = Some(message.clone());
                        }
                        match sv.events.send_timeout(event, SEND_PATIENCE) {
                            Ok(()) => {}
                            Err(SendTimeoutError::Timeout(_)) => dropped_events += 1,
                            // Receiver gone: keep supervising, stop forwarding.
                            Err(SendTimeoutError::Disconnected(_)) => {}
                        }
                    }
                }
                // Reader thread finished — stdout is closed.
                Err(_) => break,
            },
            recv(ticker) -> _ => control_tick(sv, &mut child, &mut stop),
        }
    }

    // Stdout is done; wait for the process itself, still honouring
    // cancellation, grace, and timeout.
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                control_tick(sv, &mut child, &mut stop);
                thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                warn!("wait on pid {pid} failed: {err}");
                break None;
            }
        }
    };

    let stderr_text = stderr_handle
        .join()
        .unwrap_or_default()
        .trim()
        .to_owned();
    if !stderr_text.is_empty() {
        debug!("child stderr: {stderr_text}");
    }
    if parser.discarded() > 0 {
        warn!("{} malformed event span(s) were discarded", parser.discarded());
    }
    if dropped_events > 0 {
        warn!("{dropped_events} event(s) dropped because the consumer stopped draining");
    }
    parser.clear();

    let exit_code = status.and_then(|s| s.code());

    // Cancellation wins over every other terminal state — even a clean
    // exit code 0 after the signal is reported as cancelled.
    if sv.cancel.load(Ordering::Relaxed) || stop.cancelled {
        info!("operation on pid {pid} cancelled");
        return WipeOutcome::cancelled(exit_code, sv.mechanism);
    }
    if stop.timed_out {
        return WipeOutcome::timed_out(sv.timeout.as_secs(), sv.mechanism);
    }

    resolve_exit(exit_code, last_error, &stderr_text, sv.mechanism)
}

/// Periodic control check: cancellation request, grace-kill window, timeout.
fn control_tick(sv: &Supervision, child: &mut Child, stop: &mut StopState) {
    let now = Instant::now();

    if !stop.cancelled && sv.cancel.load(Ordering::Relaxed) {
        stop.cancelled = true;
        stop.grace_deadline = Some(now + sv.grace);
        // Best effort: the tick must not block behind a full sink.
        let _ = sv.events.try_send(WipeEvent::Info {
            message: "wipe cancelled by user".to_owned(),
        });
        request_stop(child);
    }

    if let Some(grace) = stop.grace_deadline {
        if now >= grace && !stop.force_killed {
            warn!("child ignored graceful stop for {:?}; killing", sv.grace);
            force_stop(child);
            stop.force_killed = true;
        }
    }

    if !stop.timed_out && !stop.cancelled && now >= stop.deadline {
        warn!("operation exceeded {:?}; killing child", sv.timeout);
        stop.timed_out = true;
        force_stop(child);
        stop.force_killed = true;
    }
}

/// Turn an exit status plus accumulated error text into the final outcome.
fn resolve_exit(
    exit_code: Option<i32>,
    last_error: Option<String>,
    stderr_text: &str,
    mechanism: ElevationMethod,
) -> WipeOutcome {
    if exit_code == Some(0) && last_error.is_none() {
        return WipeOutcome::completed(0, mechanism);
    }

    let mut message = match last_error {
        Some(text) => text,
        None => match exit_code {
            Some(code) => format!("wipe process exited with code {code}"),
            None => "wipe process terminated by signal".to_owned(),
        },
    };
    if !stderr_text.is_empty() {
        message.push_str("\nstderr: ");
        message.push_str(stderr_text);
    }
    WipeOutcome::failed(exit_code, message, mechanism)
}

/// Graceful stop: SIGTERM on unix; Windows has no equivalent, so kill.
fn request_stop(child: &mut Child) {
    #[cfg(unix)]
    crate::platform::terminate(child.id());
    #[cfg(windows)]
    {
        let _ = child.kill();
    }
}

fn force_stop(child: &mut Child) {
    #[cfg(unix)]
    crate::platform::force_kill(child.id());
    #[cfg(windows)]
    {
        let _ = child.kill();
    }
}

/// Pump stdout on its own thread, forwarding raw chunks. The channel
/// disconnects on EOF, which is the supervisor's end-of-stream signal.
fn spawn_stdout_reader(child: &mut Child) -> Receiver<Vec<u8>> {
    let (tx, rx) = bounded::<Vec<u8>>(64);
    if let Some(mut stdout) = child.stdout.take() {
        thread::Builder::new()
            .name("wipekit-stdout".to_owned())
            .spawn(move || {
                let mut buf = [0u8; 8192];
                loop {
                    match stdout.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if tx.send(buf[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                    }
                }
            })
            .expect("failed to spawn stdout reader thread");
    }
    rx
}

/// Accumulate stderr to completion on its own thread. Stderr text alone
/// never ends the operation; it is appended to a failure message at exit.
fn spawn_stderr_reader(child: &mut Child) -> thread::JoinHandle<String> {
    let stderr = child.stderr.take();
    thread::Builder::new()
        .name("wipekit-stderr".to_owned())
        .spawn(move || {
            let mut text = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut text);
            }
            text
        })
        .expect("failed to spawn stderr reader thread")
}

/// Blocking elevated shape (Windows): the UAC helper returns only after the
/// whole invocation finishes, so the captured output is parsed in one pass
/// and the events arrive as a single burst rather than live.
#[cfg(windows)]
pub(crate) fn run_blocking_elevated(sv: Supervision) {
    use crate::platform::run_elevated_blocking;

    let outcome = match run_elevated_blocking(&sv.program, &sv.args, sv.timeout) {
        Ok(run) => {
            let mut parser = EventParser::new();
            let mut last_error = None;
            for event in parser.push(&run.output) {
                if let WipeEvent::Error { message } = &event {
                    last_error = Some(message.clone());
                }
                let _ = sv.events.send_timeout(event, SEND_PATIENCE);
            }
            parser.clear();

            if sv.cancel.load(Ordering::Relaxed) {
                WipeOutcome::cancelled(run.exit_code, sv.mechanism)
            } else if run.timed_out {
                WipeOutcome::timed_out(sv.timeout.as_secs(), sv.mechanism)
            } else if run.exit_code == Some(0) && last_error.is_none() {
                WipeOutcome::completed(0, sv.mechanism)
            } else {
                resolve_exit(run.exit_code, last_error, "", sv.mechanism)
            }
        }
        Err(err) => WipeOutcome::elevation_failed(err.to_string(), sv.mechanism),
    };

    *sv.slot.lock() = None;
    let _ = sv.outcome.send(outcome);
}
