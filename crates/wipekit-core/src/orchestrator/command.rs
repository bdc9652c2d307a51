/// Engine argument-vector construction.
///
/// Order is deterministic: the structured-output flag first, then the mode
/// selector, then optional tuning flags. Tuning flags are only emitted when
/// the request actually carries them; range checks happen in the
/// orchestrator before this module runs.
use crate::model::request::{demo_target_path, WipeRequest};

/// Name of the wrapped engine binary.
#[cfg(not(windows))]
pub const ENGINE_BINARY: &str = "securewipe";
#[cfg(windows)]
pub const ENGINE_BINARY: &str = "securewipe.exe";

/// Build the argument vector for a sanitization run.
///
/// In demo mode the caller-supplied target is ignored and a generated
/// temporary path is used instead.
pub(crate) fn wipe_args(request: &WipeRequest) -> Vec<String> {
    let mut args = vec!["--json".to_owned()];

    if request.demo {
        args.push("--demo".to_owned());
        args.push(demo_target_path());
        args.push("--demo-size".to_owned());
        args.push(request.demo_size_mb.to_string());
    } else {
        args.push("--wipe".to_owned());
        args.push(request.target.clone());
    }

    args.push("--algorithm".to_owned());
    args.push(request.algorithm.selector().to_owned());

    if let Some(kb) = request.buffer_size_kb {
        args.push("--buffer-size".to_owned());
        args.push(kb.to_string());
    }
    if let Some(passes) = request.passes {
        args.push("--passes".to_owned());
        args.push(passes.to_string());
    }

    args
}

/// Argument vector for the drive-listing mode.
pub(crate) fn list_drives_args() -> Vec<String> {
    vec!["--json".to_owned(), "--list-drives".to_owned()]
}

/// Argument vector for the system-information mode.
pub(crate) fn system_info_args() -> Vec<String> {
    vec!["--json".to_owned(), "--system-info".to_owned()]
}
