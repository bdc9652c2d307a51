/// Windows elevation and process-control primitives.
///
/// Elevation goes through the native UAC prompt via `ShellExecuteExW` with
/// the `runas` verb. UAC cannot hand us the elevated child's pipes, so the
/// invocation is wrapped in `cmd /C` with output redirected to a temp file
/// and read back after the process exits — the caller receives every event,
/// just in one burst instead of a live stream.
use super::ElevationError;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, ERROR_CANCELLED, HANDLE};
use windows::Win32::Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY};
use windows::Win32::System::Threading::{
    GetCurrentProcess, GetExitCodeProcess, OpenProcessToken, TerminateProcess,
    WaitForSingleObject,
};
use windows::Win32::UI::Shell::{ShellExecuteExW, SEE_MASK_NOCLOSEPROCESS, SHELLEXECUTEINFOW};
use windows::Win32::UI::WindowsAndMessaging::SW_HIDE;

/// Combined output captured from a blocking elevated invocation.
#[derive(Debug)]
pub(crate) struct ElevatedRun {
    /// Exit code of the elevated process, if it exited within the timeout.
    pub exit_code: Option<i32>,
    /// Combined stdout + stderr text.
    pub output: String,
    /// True when the wait deadline expired and the process was terminated.
    pub timed_out: bool,
}

/// Check whether the current process is running with elevated (admin) privileges.
pub(super) fn is_elevated() -> bool {
    unsafe {
        let mut token_handle = HANDLE::default();
        let process = GetCurrentProcess();

        if OpenProcessToken(process, TOKEN_QUERY, &mut token_handle).is_err() {
            return false;
        }

        let mut elevation = TOKEN_ELEVATION::default();
        let mut return_length = 0u32;

        let result = GetTokenInformation(
            token_handle,
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut _),
            std::mem::size_of::<TOKEN_ELEVATION>() as u32,
            &mut return_length,
        );

        let _ = CloseHandle(token_handle);

        result.is_ok() && elevation.TokenIsElevated != 0
    }
}

/// Run `program args...` elevated through UAC, blocking until it finishes.
///
/// The timeout covers the whole invocation including the prompt wait.
pub(crate) fn run_elevated_blocking(
    program: &Path,
    args: &[String],
    timeout: Duration,
) -> Result<ElevatedRun, ElevationError> {
    let capture = std::env::temp_dir().join(format!("wipekit-elevated-{}.out", std::process::id()));

    // cmd /C ""prog" "arg"... > "capture" 2>&1"
    let quoted_args: Vec<String> = args.iter().map(|a| format!("\"{a}\"")).collect();
    let params = format!(
        "/C \"\"{}\" {} > \"{}\" 2>&1\"",
        program.display(),
        quoted_args.join(" "),
        capture.display()
    );
    debug!("elevated launch: cmd {params}");

    let file_w: Vec<u16> = "cmd.exe".encode_utf16().chain(std::iter::once(0)).collect();
    let verb_w: Vec<u16> = "runas".encode_utf16().chain(std::iter::once(0)).collect();
    let params_w: Vec<u16> = params.encode_utf16().chain(std::iter::once(0)).collect();

    let mut info = SHELLEXECUTEINFOW {
        cbSize: std::mem::size_of::<SHELLEXECUTEINFOW>() as u32,
        fMask: SEE_MASK_NOCLOSEPROCESS,
        lpVerb: PCWSTR(verb_w.as_ptr()),
        lpFile: PCWSTR(file_w.as_ptr()),
        lpParameters: PCWSTR(params_w.as_ptr()),
        nShow: SW_HIDE.0,
        ..Default::default()
    };

    unsafe {
        if let Err(err) = ShellExecuteExW(&mut info) {
            let _ = std::fs::remove_file(&capture);
            return if err.code() == ERROR_CANCELLED.to_hresult() {
                Err(ElevationError::Declined)
            } else {
                Err(ElevationError::LaunchFailed(err.to_string()))
            };
        }
    }

    if info.hProcess.is_invalid() {
        let _ = std::fs::remove_file(&capture);
        return Err(ElevationError::LaunchFailed(
            "UAC launch returned no process handle".to_owned(),
        ));
    }

    let (exit_code, timed_out) = unsafe {
        let wait = WaitForSingleObject(info.hProcess, timeout.as_millis() as u32);
        if wait.0 == 0 {
            // WAIT_OBJECT_0 — process exited.
            let mut code = 0u32;
            let exit = GetExitCodeProcess(info.hProcess, &mut code)
                .map(|_| code as i32)
                .ok();
            (exit, false)
        } else if wait.0 == 0x102 {
            // WAIT_TIMEOUT — deadline expired with the process still alive.
            warn!("elevated process exceeded {timeout:?}; terminating");
            let _ = TerminateProcess(info.hProcess, 1);
            (None, true)
        } else {
            (None, false)
        }
    };

    unsafe {
        let _ = CloseHandle(info.hProcess);
    }

    let output = std::fs::read_to_string(&capture).unwrap_or_default();
    let _ = std::fs::remove_file(&capture);

    Ok(ElevatedRun {
        exit_code,
        output,
        timed_out,
    })
}
