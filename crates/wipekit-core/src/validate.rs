/// Target validation — pure predicates over the target string and the
/// filesystem, run before any process is ever spawned.
///
/// Block-device targets are recognised lexically (prefix match only, no
/// filesystem probe) and skip the existence / regular-file checks, but are
/// still held against the protected-path list and require the process to
/// already hold elevated rights.
use crate::platform;
use std::path::{Component, Path};
use thiserror::Error;

/// Why a target was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("target contains a path traversal sequence")]
    Traversal,
    #[error("target contains an embedded NUL byte")]
    NulByte,
    #[error("target must be an absolute path")]
    NotAbsolute,
    #[error("target does not exist: {0}")]
    NotFound(String),
    #[error("target is not a regular file: {0}")]
    NotRegularFile(String),
    #[error("target is a protected system path: {0}")]
    ProtectedPath(String),
    #[error("wiping {0} requires elevated privileges")]
    InsufficientPrivileges(String),
}

/// Paths that must never be offered to the engine, no matter what.
#[cfg(unix)]
const PROTECTED_PATHS: &[&str] = &[
    "/", "/bin", "/boot", "/dev", "/etc", "/lib", "/lib64", "/proc", "/run", "/sbin", "/sys",
    "/usr", "/var", "/System", "/Library", "/private",
];

#[cfg(windows)]
const PROTECTED_PATHS: &[&str] = &[
    "C:\\",
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
    "C:\\ProgramData",
];

/// Purely lexical block-device check — no filesystem probe.
pub fn is_block_device(target: &str) -> bool {
    if target.starts_with("/dev/") {
        return target.len() > "/dev/".len();
    }
    // Windows physical-drive / volume syntax: \\.\PhysicalDrive0, \\.\C:
    if let Some(rest) = target.strip_prefix("\\\\.\\") {
        return rest.starts_with("PhysicalDrive") || (rest.len() == 2 && rest.ends_with(':'));
    }
    false
}

/// Validate a wipe target. Returns `Ok(())` or the first applicable reason
/// for rejection. Pure — the only side effects are metadata reads.
pub fn validate_target(target: &str) -> Result<(), ValidationError> {
    if target.contains('\0') {
        return Err(ValidationError::NulByte);
    }
    if has_traversal(target) {
        return Err(ValidationError::Traversal);
    }

    if is_block_device(target) {
        if is_protected(target) {
            return Err(ValidationError::ProtectedPath(target.to_owned()));
        }
        // Raw devices cannot be write-probed meaningfully; require the
        // process to already be elevated rather than silently proceeding.
        if !platform::is_elevated() {
            return Err(ValidationError::InsufficientPrivileges(target.to_owned()));
        }
        return Ok(());
    }

    let path = Path::new(target);
    if !path.is_absolute() {
        return Err(ValidationError::NotAbsolute);
    }
    if is_protected(target) {
        return Err(ValidationError::ProtectedPath(target.to_owned()));
    }

    let meta = std::fs::symlink_metadata(path)
        .map_err(|_| ValidationError::NotFound(target.to_owned()))?;
    if !meta.is_file() {
        return Err(ValidationError::NotRegularFile(target.to_owned()));
    }

    Ok(())
}

/// Any `..` path component counts as traversal, on either separator style.
fn has_traversal(target: &str) -> bool {
    Path::new(target)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
        || target.split(['/', '\\']).any(|seg| seg == "..")
}

fn is_protected(target: &str) -> bool {
    let normalized = if target.len() > 1 {
        target.trim_end_matches(['/', '\\'])
    } else {
        target
    };
    PROTECTED_PATHS.iter().any(|p| {
        let p_trim = if p.len() > 1 {
            p.trim_end_matches(['/', '\\'])
        } else {
            p
        };
        normalized.eq_ignore_ascii_case(p_trim)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn rejects_embedded_nul() {
        assert_eq!(validate_target("/tmp/a\0b"), Err(ValidationError::NulByte));
    }

    #[test]
    fn rejects_traversal() {
        assert_eq!(
            validate_target("/tmp/../etc/passwd"),
            Err(ValidationError::Traversal)
        );
        assert_eq!(
            validate_target("C:\\data\\..\\Windows"),
            Err(ValidationError::Traversal)
        );
    }

    #[cfg(unix)]
    #[test]
    fn rejects_relative_paths() {
        assert_eq!(
            validate_target("relative/file.bin"),
            Err(ValidationError::NotAbsolute)
        );
    }

    #[test]
    fn rejects_missing_file() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("gone.bin");
        assert!(matches!(
            validate_target(&missing.to_string_lossy()),
            Err(ValidationError::NotFound(_))
        ));
    }

    #[test]
    fn rejects_directory_target() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            validate_target(&tmp.path().to_string_lossy()),
            Err(ValidationError::NotRegularFile(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_protected_roots() {
        assert!(matches!(
            validate_target("/etc"),
            Err(ValidationError::ProtectedPath(_))
        ));
        assert!(matches!(
            validate_target("/"),
            Err(ValidationError::ProtectedPath(_))
        ));
    }

    #[test]
    fn accepts_existing_regular_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("victim.bin");
        let mut f = std::fs::File::create(&file).unwrap();
        f.write_all(b"doomed data").unwrap();
        assert_eq!(validate_target(&file.to_string_lossy()), Ok(()));
    }

    #[test]
    fn block_device_detection_is_lexical() {
        assert!(is_block_device("/dev/sda"));
        assert!(is_block_device("/dev/nvme0n1"));
        assert!(!is_block_device("/dev/"));
        assert!(!is_block_device("/devsda"));
        assert!(is_block_device("\\\\.\\PhysicalDrive0"));
        assert!(is_block_device("\\\\.\\D:"));
        assert!(!is_block_device("\\\\.\\pipe\\thing"));
        assert!(!is_block_device("/tmp/dev/sda"));
    }

    #[test]
    fn block_device_without_elevation_is_refused() {
        if crate::platform::is_elevated() {
            // As root the device path passes the privilege gate instead.
            assert_eq!(validate_target("/dev/sdz"), Ok(()));
        } else {
            assert!(matches!(
                validate_target("/dev/sdz"),
                Err(ValidationError::InsufficientPrivileges(_))
            ));
        }
    }
}
