//! ELF RPATH rewriting via `patchelf` (spec.md §4.6.1).

use crate::error::CoreError;
use std::path::Path;
use std::process::Command;

/// Removes any existing `DT_RUNPATH`/`DT_RPATH` and sets `rpath` via
/// `patchelf`.
///
/// # Errors
///
/// Returns `ExternalToolMissing` if `patchelf` is not on PATH, or
/// `SubprocessFailed` if it exits non-zero.
pub fn set_rpath(binary: &Path, rpath: &str) -> Result<(), CoreError> {
    run_patchelf(binary, &["--remove-rpath"])?;
    run_patchelf(binary, &["--force-rpath", "--set-rpath", rpath])
}

fn run_patchelf(binary: &Path, args: &[&str]) -> Result<(), CoreError> {
    let output = match Command::new("patchelf").args(args).arg(binary).output() {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CoreError::ExternalToolMissing("patchelf".to_string()));
        }
        Err(e) => return Err(CoreError::Io(e)),
    };

    if output.status.success() {
        Ok(())
    } else {
        Err(CoreError::SubprocessFailed {
            command: format!("patchelf {}", args.join(" ")),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Reads the current rpath via `patchelf --print-rpath`, for tests and
/// diagnostics.
///
/// # Errors
///
/// Returns `ExternalToolMissing` or `SubprocessFailed` as above.
pub fn print_rpath(binary: &Path) -> Result<String, CoreError> {
    let output = match Command::new("patchelf")
        .arg("--print-rpath")
        .arg(binary)
        .output()
    {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CoreError::ExternalToolMissing("patchelf".to_string()));
        }
        Err(e) => return Err(CoreError::Io(e)),
    };

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(CoreError::SubprocessFailed {
            command: "patchelf --print-rpath".to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
