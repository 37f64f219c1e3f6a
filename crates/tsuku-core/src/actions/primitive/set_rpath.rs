//! `set_rpath` primitive (spec.md §4.6.1): dispatches to the platform's
//! relocation tool, falling back to a wrapper script when patching fails
//! and `create_wrapper` is set.

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::paths::{ensure_within, validate_rpath, validate_wrapper_filename};
use crate::registry::{Action, Primitive};
use crate::relocate::{self, elf, macho, BinaryFormat};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Params {
    binaries: Vec<String>,
    rpath: String,
    #[serde(default)]
    create_wrapper: bool,
}

pub struct SetRpath;

impl Action for SetRpath {
    fn name(&self) -> &'static str {
        "set_rpath"
    }
}

#[async_trait]
impl Primitive for SetRpath {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: Params = params::decode(raw_params)?;
        validate_rpath(&p.rpath, &ctx.libs_dir)?;

        for relative in &p.binaries {
            let binary = ensure_within(&ctx.work_dir.join(relative), &ctx.work_dir)?;
            patch_one(&binary, &p.rpath, p.create_wrapper).await?;
        }

        Ok(())
    }
}

async fn patch_one(binary: &Path, rpath: &str, create_wrapper: bool) -> Result<(), CoreError> {
    let format = relocate::detect_format(binary)
        .ok_or_else(|| CoreError::UnsupportedBinary(binary.display().to_string()))?;

    let original_mode = make_writable(binary).await?;
    let result = match format {
        BinaryFormat::Elf => elf::set_rpath(binary, rpath),
        BinaryFormat::MachO | BinaryFormat::FatMachO => macho::set_rpath(binary, rpath),
    };
    restore_mode(binary, original_mode).await?;

    match result {
        Ok(()) => Ok(()),
        Err(_) if create_wrapper => write_wrapper(binary, format).await,
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
async fn make_writable(path: &Path) -> Result<u32, CoreError> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = tokio::fs::metadata(path).await?;
    let mode = metadata.permissions().mode();
    let mut writable = metadata.permissions();
    writable.set_mode(mode | 0o200);
    tokio::fs::set_permissions(path, writable).await?;
    Ok(mode)
}

#[cfg(unix)]
async fn restore_mode(path: &Path, mode: u32) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    Ok(())
}

/// Renames `binary` to `binary.orig` and writes a shell wrapper that exports
/// the platform's library-search-path variable before exec'ing the original.
///
/// Refuses to wrap symlinks, per spec.md §4.6.1.
async fn write_wrapper(binary: &Path, format: BinaryFormat) -> Result<(), CoreError> {
    let metadata = tokio::fs::symlink_metadata(binary).await?;
    if metadata.file_type().is_symlink() {
        return Err(CoreError::UnsupportedBinary(format!(
            "refusing to wrap a symlink: {}",
            binary.display()
        )));
    }

    let original = binary.with_extension("orig");
    tokio::fs::rename(binary, &original).await?;

    let (var, lib_suffix) = match format {
        BinaryFormat::Elf => ("LD_LIBRARY_PATH", "../lib"),
        BinaryFormat::MachO | BinaryFormat::FatMachO => ("DYLD_LIBRARY_PATH", "../lib"),
    };

    let orig_name = original
        .file_name()
        .ok_or_else(|| CoreError::BadParam("binary path has no filename".to_string()))?
        .to_string_lossy()
        .into_owned();
    validate_wrapper_filename(&orig_name)?;

    let script = format!(
        "#!/bin/sh\nSCRIPT_DIR=$(cd \"$(dirname \"$0\")\" && pwd)\nexport {var}=\"$SCRIPT_DIR/{lib_suffix}\"\nexec \"$SCRIPT_DIR/{orig_name}\" \"$@\"\n"
    );

    tokio::fs::write(binary, script).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(binary, std::fs::Permissions::from_mode(0o755)).await?;
    }

    Ok(())
}
