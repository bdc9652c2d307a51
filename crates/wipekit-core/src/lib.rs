/// WipeKit Core — supervision of the securewipe data-sanitization engine.
///
/// This crate contains all orchestration logic with zero UI dependencies.
/// It launches the external engine, reassembles its fragmented JSON output
/// into typed events, resolves privilege requirements per platform, and
/// spawns elevated when a target demands it.
///
/// # Modules
///
/// - [`model`] — Request, event, and outcome types plus size formatting.
/// - [`validate`] — Target validation run before any process is spawned.
/// - [`platform`] — Privilege resolution and elevation primitives per OS.
/// - [`parser`] — Incremental, string-aware JSON event reassembly.
/// - [`orchestrator`] — Process lifecycle: spawn, stream, cancel, timeout.
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod platform;
pub mod validate;

pub use model::{
    DriveEntry, OutcomeStatus, SystemReport, WipeAlgorithm, WipeEvent, WipeOutcome, WipeRequest,
};
pub use orchestrator::{
    Orchestrator, QueryError, StartError, WipeHandle, DEFAULT_TIMEOUT, ENGINE_BINARY,
    EVENT_CHANNEL_CAPACITY,
};
pub use parser::EventParser;
pub use platform::{
    check_privileges, elevation_description, is_elevated, supports_gui_prompts, ElevationError,
    ElevationMethod, PrivilegeStatus,
};
pub use validate::{is_block_device, validate_target, ValidationError};
