/// Unix (Linux and macOS) elevation and process-control primitives.
///
/// Elevation re-invokes the engine through `pkexec` or `sudo` as a regular
/// piped child, so progress events keep streaming live. Termination uses
/// SIGTERM first and SIGKILL after the grace period.
use super::ElevationMethod;
use tracing::debug;

pub(super) fn is_elevated() -> bool {
    // SAFETY: geteuid has no failure mode and touches no memory.
    unsafe { libc::geteuid() == 0 }
}

pub(super) fn current_user() -> String {
    // SUDO_USER names the invoking user when we are already running under
    // sudo, which is the more useful identity to report.
    std::env::var("SUDO_USER")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "unknown".to_owned())
}

/// True when the environment indicates a running display server.
pub(super) fn has_display() -> bool {
    let set = |var: &str| std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false);
    set("DISPLAY") || set("WAYLAND_DISPLAY")
}

/// Pick the elevation mechanism for this session, probed fresh each call.
///
/// macOS always reports `sudo` — its own prompt handling sits behind it.
/// Linux prefers the graphical PolicyKit agent when a display is present,
/// falling back to plain `sudo`, then to `None`.
pub(super) fn detect_method() -> ElevationMethod {
    #[cfg(target_os = "macos")]
    {
        ElevationMethod::Sudo
    }
    #[cfg(not(target_os = "macos"))]
    {
        if has_display() && which::which("pkexec").is_ok() {
            ElevationMethod::Pkexec
        } else if which::which("sudo").is_ok() {
            ElevationMethod::Sudo
        } else {
            ElevationMethod::None
        }
    }
}

/// Ask the child to exit gracefully (SIGTERM).
pub(crate) fn terminate(pid: u32) {
    debug!("sending SIGTERM to pid {pid}");
    // SAFETY: plain syscall; an invalid pid returns ESRCH, which we ignore.
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
}

/// Force the child to exit (SIGKILL). Used after the grace period and on
/// timeout.
pub(crate) fn force_kill(pid: u32) {
    debug!("sending SIGKILL to pid {pid}");
    // SAFETY: see `terminate`.
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGKILL);
    }
}
