/// Platform-specific functionality — elevation checks, privilege probing,
/// and elevated process spawning.
///
/// The orchestrator itself is platform-agnostic; everything that differs
/// per OS family (elevation mechanism, GUI-prompt availability, how to
/// terminate a child) lives behind this module's flat API.
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub(crate) use unix::{force_kill, terminate};
#[cfg(windows)]
pub(crate) use windows::run_elevated_blocking;

use std::fs::OpenOptions;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// How elevated rights can be obtained on this platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationMethod {
    /// PolicyKit graphical agent (Linux desktop sessions).
    Pkexec,
    /// Classic terminal `sudo` (Linux fallback, always on macOS).
    Sudo,
    /// Windows User Account Control prompt.
    Uac,
    /// No elevation mechanism is available.
    None,
}

impl ElevationMethod {
    /// Command name of the mechanism, where one exists as a binary.
    pub fn command(self) -> Option<&'static str> {
        match self {
            Self::Pkexec => Some("pkexec"),
            Self::Sudo => Some("sudo"),
            Self::Uac | Self::None => None,
        }
    }
}

/// Failures specific to obtaining elevated rights, kept distinct from
/// wipe-level failures so callers can explain "privileges were needed but
/// not obtained" separately.
#[derive(Debug, Error)]
pub enum ElevationError {
    #[error("no elevation method available on this system")]
    NoMethodAvailable,
    #[error("the elevation prompt was declined")]
    Declined,
    #[error("elevation helper not found: {0}")]
    HelperMissing(String),
    #[error("elevated launch failed: {0}")]
    LaunchFailed(String),
}

/// Snapshot of the current principal's rights with respect to a target.
///
/// Recomputed on every check — filesystem permissions differ per path, so
/// this is never cached across target changes.
#[derive(Debug, Clone)]
pub struct PrivilegeStatus {
    /// Name of the current user, best effort.
    pub user: String,
    /// Whether the process already holds elevated rights.
    pub elevated: bool,
    /// Whether acting on the checked target requires elevation.
    pub needs_elevation: bool,
    /// OS family identifier, e.g. "linux", "macos", "windows".
    pub platform: &'static str,
    /// Mechanism that would be used to elevate.
    pub method: ElevationMethod,
}

/// Check whether the current process is running with elevated privileges.
pub fn is_elevated() -> bool {
    imp_is_elevated()
}

#[cfg(unix)]
fn imp_is_elevated() -> bool {
    unix::is_elevated()
}

#[cfg(windows)]
fn imp_is_elevated() -> bool {
    windows::is_elevated()
}

/// Elevation mechanism the current platform supports, probed fresh.
pub fn detect_method() -> ElevationMethod {
    #[cfg(unix)]
    {
        unix::detect_method()
    }
    #[cfg(windows)]
    {
        ElevationMethod::Uac
    }
}

/// Whether a graphical elevation prompt can be shown.
///
/// Always true on macOS and Windows; on Linux only when the environment
/// indicates a running display server.
pub fn supports_gui_prompts() -> bool {
    #[cfg(target_os = "macos")]
    {
        true
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        unix::has_display()
    }
    #[cfg(windows)]
    {
        true
    }
}

/// Fixed human-readable description of an elevation mechanism.
pub fn elevation_description(method: ElevationMethod) -> &'static str {
    match method {
        ElevationMethod::Pkexec => {
            "a graphical authorization prompt (pkexec) will ask for your password"
        }
        ElevationMethod::Sudo => "sudo will ask for your password in the terminal",
        ElevationMethod::Uac => "a User Account Control prompt will ask for confirmation",
        ElevationMethod::None => "administrator privileges required",
    }
}

/// Determine whether acting on `target` requires elevation.
///
/// Never returns an error: probe failures (permission denied, path vanished)
/// are folded into `needs_elevation = true`. With no target, sanitization is
/// assumed privileged by default.
pub fn check_privileges(target: Option<&Path>) -> PrivilegeStatus {
    let elevated = is_elevated();
    let method = detect_method();
    let user = current_user();

    let needs_elevation = if elevated {
        false
    } else {
        match target {
            Some(path) => !probe_write_access(path),
            // No target given: assume the privileged default.
            None => true,
        }
    };

    debug!(
        "privilege check: user={user} elevated={elevated} \
         needs_elevation={needs_elevation} method={method:?}"
    );

    PrivilegeStatus {
        user,
        elevated,
        needs_elevation,
        platform: platform_name(),
        method,
    }
}

/// OS family identifier used in [`PrivilegeStatus`].
pub fn platform_name() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(windows) {
        "windows"
    } else {
        "linux"
    }
}

fn current_user() -> String {
    #[cfg(unix)]
    {
        unix::current_user()
    }
    #[cfg(windows)]
    {
        std::env::var("USERNAME").unwrap_or_else(|_| "unknown".to_owned())
    }
}

/// Probe whether the current user can write to `path`.
///
/// Directories get a create-and-remove marker file; file targets (and
/// nonexistent paths) recurse the same probe onto their parent directory.
/// Any probe error means "no access".
fn probe_write_access(path: &Path) -> bool {
    let probe_parent = |path: &Path| match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => false,
        Some(parent) => probe_write_access(parent),
        None => false,
    };

    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return probe_parent(path),
    };

    if meta.is_dir() {
        let marker = path.join(format!(".wipekit-probe-{}", std::process::id()));
        match OpenOptions::new().write(true).create_new(true).open(&marker) {
            Ok(file) => {
                drop(file);
                let _ = std::fs::remove_file(&marker);
                true
            }
            Err(_) => false,
        }
    } else {
        probe_parent(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writable_tmp_dir_needs_no_elevation() {
        if is_elevated() {
            // Root can write anywhere; the probe result is trivially false.
            return;
        }
        let tmp = TempDir::new().expect("failed to create temp dir");
        let status = check_privileges(Some(tmp.path()));
        assert!(!status.needs_elevation);
        assert!(!status.elevated);
    }

    #[test]
    fn missing_target_probes_parent_directory() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let target = tmp.path().join("not-yet-created.bin");
        let status = check_privileges(Some(&target));
        if !is_elevated() {
            assert!(!status.needs_elevation);
        }
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_parent_needs_elevation() {
        use std::os::unix::fs::PermissionsExt;

        if is_elevated() {
            return;
        }
        let tmp = TempDir::new().expect("failed to create temp dir");
        let locked = tmp.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        let status = check_privileges(Some(&locked.join("file.bin")));
        assert!(status.needs_elevation);

        // Restore so TempDir cleanup succeeds.
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn no_target_defaults_to_needing_elevation() {
        let status = check_privileges(None);
        if !status.elevated {
            assert!(status.needs_elevation);
        }
    }

    #[test]
    fn check_never_panics_for_odd_paths() {
        let _ = check_privileges(Some(Path::new("/nonexistent/deeply/nested/target")));
        let _ = check_privileges(Some(Path::new("relative/path")));
    }

    #[test]
    fn descriptions_are_fixed_strings() {
        assert!(elevation_description(ElevationMethod::None).contains("administrator"));
        assert!(elevation_description(ElevationMethod::Sudo).contains("sudo"));
        assert!(elevation_description(ElevationMethod::Pkexec).contains("pkexec"));
    }
}
