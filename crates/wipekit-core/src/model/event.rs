/// Typed events parsed from the securewipe engine's JSON output stream.
///
/// Every stdout line the engine emits is a JSON object carrying a `"type"`
/// discriminator — except the system-information payload, which is a flat
/// object recognised by the simultaneous presence of `os_name`,
/// `os_version`, and `architecture`. Classification happens in
/// [`crate::parser`]; an event is never exposed partially formed.
use serde::{Deserialize, Serialize};

/// One entry of the engine's drive listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveEntry {
    /// Device path, e.g. `/dev/sda` or `\\.\PhysicalDrive0`.
    pub device: String,
    /// Hardware model string, when the engine could read it.
    #[serde(default)]
    pub model: Option<String>,
    /// Capacity in bytes.
    #[serde(default)]
    pub size_bytes: u64,
    /// Whether the engine classified the device as removable media.
    #[serde(default)]
    pub removable: bool,
}

/// Flat system description returned by the engine's system-information mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemReport {
    pub os_name: String,
    pub os_version: String,
    pub architecture: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub total_memory_bytes: Option<u64>,
}

/// The closed set of events the engine can emit.
///
/// Variants mirror the wire discriminators one-to-one. `SystemInfo` has no
/// discriminator on the wire and is constructed by the parser, never by
/// serde tag dispatch — hence the `skip` attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WipeEvent {
    /// The engine accepted the operation and is about to begin.
    Start {
        target: String,
        algorithm: String,
        total_passes: u32,
        #[serde(default)]
        total_bytes: u64,
    },
    /// An overwrite pass began.
    PassStart {
        pass: u32,
        total_passes: u32,
        #[serde(default)]
        pattern: Option<String>,
    },
    /// Periodic progress within a pass.
    Progress {
        pass: u32,
        total_passes: u32,
        bytes_written: u64,
        total_bytes: u64,
        percent: f64,
        /// Write throughput in bytes per second, when the engine reports it.
        #[serde(default)]
        throughput_bps: u64,
    },
    /// An overwrite pass finished.
    PassComplete { pass: u32, total_passes: u32 },
    /// The whole operation finished successfully (engine view).
    Complete {
        #[serde(default)]
        duration_secs: f64,
    },
    /// Informational message. Also synthesized locally on cancellation.
    Info { message: String },
    /// Engine-reported error. Presence of any `Error` event fails the operation
    /// regardless of exit code.
    Error { message: String },
    /// Drive listing payload (listing mode only).
    DriveList { drives: Vec<DriveEntry> },
    /// System description payload (system-information mode only).
    #[serde(skip)]
    SystemInfo(SystemReport),
}

impl WipeEvent {
    /// True for the engine's error-kind event.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// True for events that end an operation from the engine's point of view.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}
