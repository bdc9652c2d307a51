/// Data model for WipeKit.
///
/// Re-exports the request, event, and outcome types exchanged between the
/// orchestrator and its callers.
pub mod event;
pub mod outcome;
pub mod request;
pub mod size;

pub use event::{DriveEntry, SystemReport, WipeEvent};
pub use outcome::{OutcomeStatus, WipeOutcome};
pub use request::{WipeAlgorithm, WipeRequest};
