/// Final result of a supervised operation.
///
/// Exactly one `WipeOutcome` is resolved per operation, after the child
/// process has exited (or been killed). Event-level failures, stderr text,
/// and elevation problems all collapse into this single value.
use crate::platform::ElevationMethod;

/// Terminal state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Exit code 0 and no error-kind event observed.
    Completed,
    /// Non-zero exit, an error-kind event, a spawn failure, or an
    /// elevation failure.
    Failed,
    /// Cancellation was requested. Always reported as cancelled, even if
    /// the child happened to exit 0 before the signal landed.
    Cancelled,
    /// The wall-clock timeout fired and the child was killed.
    TimedOut,
}

/// Resolved result of one wipe, listing, or query operation.
#[derive(Debug, Clone)]
pub struct WipeOutcome {
    pub status: OutcomeStatus,
    /// Child exit code, when the process ran and exited normally.
    pub exit_code: Option<i32>,
    /// Human-readable summary: the most recent engine error, a fallback
    /// "exited with code N" message, or the success text. Stderr output is
    /// appended when present.
    pub message: String,
    /// Elevation mechanism the operation ran under.
    /// `ElevationMethod::None` for direct spawns.
    pub mechanism: ElevationMethod,
    /// Set when the failure was about obtaining privileges rather than the
    /// wipe itself (prompt declined, no mechanism available, helper missing).
    pub elevation_error: Option<String>,
}

impl WipeOutcome {
    pub fn success(&self) -> bool {
        self.status == OutcomeStatus::Completed
    }

    pub(crate) fn completed(exit_code: i32, mechanism: ElevationMethod) -> Self {
        Self {
            status: OutcomeStatus::Completed,
            exit_code: Some(exit_code),
            message: "wipe completed".to_owned(),
            mechanism,
            elevation_error: None,
        }
    }

    pub(crate) fn failed(
        exit_code: Option<i32>,
        message: impl Into<String>,
        mechanism: ElevationMethod,
    ) -> Self {
        Self {
            status: OutcomeStatus::Failed,
            exit_code,
            message: message.into(),
            mechanism,
            elevation_error: None,
        }
    }

    pub(crate) fn elevation_failed(message: impl Into<String>, mechanism: ElevationMethod) -> Self {
        let message = message.into();
        Self {
            status: OutcomeStatus::Failed,
            exit_code: None,
            message: message.clone(),
            mechanism,
            elevation_error: Some(message),
        }
    }

    pub(crate) fn cancelled(exit_code: Option<i32>, mechanism: ElevationMethod) -> Self {
        Self {
            status: OutcomeStatus::Cancelled,
            exit_code,
            message: "wipe cancelled by user".to_owned(),
            mechanism,
            elevation_error: None,
        }
    }

    pub(crate) fn timed_out(timeout_secs: u64, mechanism: ElevationMethod) -> Self {
        Self {
            status: OutcomeStatus::TimedOut,
            exit_code: None,
            message: format!("operation timed out after {timeout_secs} s"),
            mechanism,
            elevation_error: None,
        }
    }
}
