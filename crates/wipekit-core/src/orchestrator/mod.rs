/// Process orchestrator — the single owner of the engine child process.
///
/// State machine per operation: Idle → Validating → Spawning → Running →
/// (Completing | Cancelling | TimingOut) → Idle, enforced by one
/// `Mutex<Option<ActiveOperation>>` slot. A second start while the slot is
/// occupied is rejected before any spawn attempt — operations are never
/// queued or interleaved.
///
/// Drive listing and system queries run through the same machinery with a
/// reduced argument vector and expect a single classified payload instead
/// of a progress stream.
pub(crate) mod command;
mod supervisor;

pub use command::ENGINE_BINARY;

use crate::model::{DriveEntry, SystemReport, WipeEvent, WipeOutcome, WipeRequest};
use crate::platform::{self, ElevationError, ElevationMethod};
use crate::validate::{self, ValidationError};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use supervisor::Supervision;
use thiserror::Error;
use tracing::{debug, info};

/// Maximum number of events that may queue up in a handle's channel.
///
/// The engine emits progress at most a few times per second; 1 024 gives a
/// slow consumer minutes of headroom. A consumer that stops draining
/// altogether starts losing events rather than stalling supervision.
pub const EVENT_CHANNEL_CAPACITY: usize = 1_024;

/// Default wall-clock ceiling for a sanitization run, elevation prompt
/// included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default ceiling for drive-listing and system-information queries.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Window between the graceful stop request and the forceful kill.
const CANCEL_GRACE: Duration = Duration::from_secs(2);

/// Why an operation could not be started. All variants are raised before a
/// child process exists; a failed spawn itself resolves through the outcome.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("another operation is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("pass count must be between 1 and 100, got {0}")]
    InvalidPassCount(u32),
    #[error("buffer size must be greater than zero")]
    InvalidBufferSize,
    #[error("wipe engine not found (looked for {0})")]
    BinaryNotFound(String),
    #[error("wipe engine is not executable: {0}")]
    BinaryNotExecutable(String),
    #[error(transparent)]
    Elevation(#[from] ElevationError),
}

/// Why a drive-listing or system-information query failed.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Start(#[from] StartError),
    #[error("query failed: {0}")]
    Failed(String),
    #[error("engine produced no {0} payload")]
    MissingPayload(&'static str),
}

/// Marker held in the orchestrator's slot while a child process lives.
pub(crate) struct ActiveOperation {
    cancel: Arc<AtomicBool>,
}

/// Handle to a running operation: the ordered event stream plus the
/// eventual outcome.
pub struct WipeHandle {
    /// Receives every parsed event in arrival order.
    pub events: Receiver<WipeEvent>,
    outcome: Receiver<WipeOutcome>,
}

impl WipeHandle {
    /// Block until the operation resolves.
    pub fn wait(&self) -> WipeOutcome {
        self.outcome.recv().unwrap_or_else(|_| {
            WipeOutcome::failed(None, "supervisor thread disappeared", ElevationMethod::None)
        })
    }

    /// Non-blocking check for the outcome.
    pub fn try_outcome(&self) -> Option<WipeOutcome> {
        self.outcome.try_recv().ok()
    }
}

/// Supervisor for the securewipe engine. Owned by its caller; at most one
/// operation runs at a time per orchestrator value.
pub struct Orchestrator {
    binary: Option<PathBuf>,
    timeout: Duration,
    query_timeout: Duration,
    slot: Arc<Mutex<Option<ActiveOperation>>>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            binary: None,
            timeout: DEFAULT_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Use an explicit engine path instead of searching `PATH`.
    pub fn with_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Override the wall-clock timeout for sanitization runs.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the timeout for listing and query operations.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// True exactly while a child process handle is held.
    pub fn is_active(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Request cancellation of the active operation. A no-op when idle.
    ///
    /// The supervisor emits a synthetic informational event, sends the
    /// graceful stop signal, and escalates to a kill after the grace
    /// window. The outcome is always reported as cancelled, even if the
    /// child exits cleanly first.
    pub fn cancel(&self) {
        if let Some(op) = self.slot.lock().as_ref() {
            info!("cancellation requested");
            op.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Start a sanitization run, returning a handle with a freshly created
    /// event channel.
    pub fn start(&self, request: WipeRequest) -> Result<WipeHandle, StartError> {
        let (tx, rx) = bounded(EVENT_CHANNEL_CAPACITY);
        let outcome = self.start_with_sink(request, tx)?;
        Ok(WipeHandle {
            events: rx,
            outcome,
        })
    }

    /// Start a sanitization run, forwarding events into a caller-supplied
    /// sink. A sink whose receiver is dropped or stops draining never
    /// corrupts orchestrator state; events are dropped and supervision
    /// (cancellation, timeout) keeps running.
    pub fn start_with_sink(
        &self,
        request: WipeRequest,
        sink: Sender<WipeEvent>,
    ) -> Result<Receiver<WipeOutcome>, StartError> {
        if let Some(passes) = request.passes {
            if !(1..=100).contains(&passes) {
                return Err(StartError::InvalidPassCount(passes));
            }
        }
        if request.buffer_size_kb == Some(0) {
            return Err(StartError::InvalidBufferSize);
        }
        if !request.demo {
            validate::validate_target(&request.target)?;
        }

        let binary = self.resolve_binary()?;
        let args = command::wipe_args(&request);
        let (program, args, mechanism) = self.resolve_spawn_shape(&request, binary, args)?;

        self.spawn_supervised(program, args, mechanism, self.timeout, sink)
    }

    /// Run the engine's drive-listing mode and return the classified payload.
    pub fn list_drives(&self) -> Result<Vec<DriveEntry>, QueryError> {
        let events = self.run_query(command::list_drives_args())?;
        events
            .into_iter()
            .find_map(|ev| match ev {
                WipeEvent::DriveList { drives } => Some(drives),
                _ => None,
            })
            .ok_or(QueryError::MissingPayload("drive list"))
    }

    /// Run the engine's system-information mode and return the report.
    pub fn system_info(&self) -> Result<SystemReport, QueryError> {
        let events = self.run_query(command::system_info_args())?;
        events
            .into_iter()
            .find_map(|ev| match ev {
                WipeEvent::SystemInfo(report) => Some(report),
                _ => None,
            })
            .ok_or(QueryError::MissingPayload("system report"))
    }

    /// Locate the wrapped engine binary.
    pub fn check_binary(&self) -> Result<PathBuf, StartError> {
        self.resolve_binary()
    }

    /// Locate the engine and verify it can actually be executed.
    pub fn validate_binary_access(&self) -> Result<PathBuf, StartError> {
        let path = self.resolve_binary()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let meta = std::fs::metadata(&path)
                .map_err(|_| StartError::BinaryNotFound(path.display().to_string()))?;
            if meta.permissions().mode() & 0o111 == 0 {
                return Err(StartError::BinaryNotExecutable(path.display().to_string()));
            }
        }
        Ok(path)
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn resolve_binary(&self) -> Result<PathBuf, StartError> {
        match &self.binary {
            Some(path) => {
                if path.is_file() {
                    Ok(path.clone())
                } else {
                    Err(StartError::BinaryNotFound(path.display().to_string()))
                }
            }
            None => which::which(ENGINE_BINARY)
                .map_err(|_| StartError::BinaryNotFound(ENGINE_BINARY.to_owned())),
        }
    }

    /// Decide between a direct spawn and one of the two elevated shapes.
    ///
    /// Elevation is only attempted when the request asks for it AND the
    /// privilege probe says the target needs it. Demo targets live in the
    /// temp directory and never elevate.
    fn resolve_spawn_shape(
        &self,
        request: &WipeRequest,
        binary: PathBuf,
        args: Vec<String>,
    ) -> Result<(PathBuf, Vec<String>, ElevationMethod), StartError> {
        if !request.elevate || request.demo {
            return Ok((binary, args, ElevationMethod::None));
        }

        let status = platform::check_privileges(Some(Path::new(&request.target)));
        if !status.needs_elevation {
            return Ok((binary, args, ElevationMethod::None));
        }

        debug!(
            "target requires elevation; mechanism {:?} on {}",
            status.method, status.platform
        );

        match status.method {
            ElevationMethod::None => Err(ElevationError::NoMethodAvailable.into()),
            ElevationMethod::Uac => {
                // Blocking shape: the supervisor routes this through the
                // UAC prompt-and-run primitive.
                Ok((binary, args, ElevationMethod::Uac))
            }
            method @ (ElevationMethod::Pkexec | ElevationMethod::Sudo) => {
                // Streaming shape: re-invoke through the helper as a
                // regular piped child so events keep arriving live.
                let helper_name = method.command().unwrap_or_default();
                let helper = which::which(helper_name)
                    .map_err(|_| ElevationError::HelperMissing(helper_name.to_owned()))?;
                let mut wrapped = vec![binary.display().to_string()];
                wrapped.extend(args);
                Ok((helper, wrapped, method))
            }
        }
    }

    /// Reserve the handle slot and hand the run to a supervisor thread.
    fn spawn_supervised(
        &self,
        program: PathBuf,
        args: Vec<String>,
        mechanism: ElevationMethod,
        timeout: Duration,
        sink: Sender<WipeEvent>,
    ) -> Result<Receiver<WipeOutcome>, StartError> {
        let cancel = Arc::new(AtomicBool::new(false));
        {
            let mut slot = self.slot.lock();
            if slot.is_some() {
                return Err(StartError::AlreadyRunning);
            }
            *slot = Some(ActiveOperation {
                cancel: cancel.clone(),
            });
        }

        let (outcome_tx, outcome_rx) = bounded(1);
        let sv = Supervision {
            program,
            args,
            mechanism,
            timeout,
            grace: CANCEL_GRACE,
            cancel,
            events: sink,
            outcome: outcome_tx,
            slot: self.slot.clone(),
        };

        thread::Builder::new()
            .name("wipekit-supervisor".to_owned())
            .spawn(move || {
                #[cfg(windows)]
                if sv.mechanism == ElevationMethod::Uac {
                    supervisor::run_blocking_elevated(sv);
                    return;
                }
                supervisor::run(sv);
            })
            .expect("failed to spawn supervisor thread");

        Ok(outcome_rx)
    }

    /// Shared path for the single-payload query modes.
    fn run_query(&self, args: Vec<String>) -> Result<Vec<WipeEvent>, QueryError> {
        let binary = self.resolve_binary()?;
        let (tx, rx) = bounded(EVENT_CHANNEL_CAPACITY);
        // Queries never elevate: the engine degrades gracefully when it
        // cannot open a device for detail, and listing must work for
        // unprivileged callers.
        let outcome_rx =
            self.spawn_supervised(binary, args, ElevationMethod::None, self.query_timeout, tx)?;

        let mut events = Vec::new();
        while let Ok(event) = rx.recv() {
            events.push(event);
        }
        let outcome = outcome_rx
            .recv()
            .map_err(|_| QueryError::Failed("supervisor thread disappeared".to_owned()))?;
        if !outcome.success() {
            return Err(QueryError::Failed(outcome.message));
        }
        Ok(events)
    }
}
