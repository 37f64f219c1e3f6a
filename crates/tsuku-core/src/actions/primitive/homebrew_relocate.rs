//! `homebrew_relocate` primitive (spec.md §4.6.2): rewrites placeholders
//! across the staged install tree, then patches or wraps the binaries the
//! classification pass in `relocate::homebrew` collected.

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::paths::validate_wrapper_filename;
use crate::registry::{Action, Primitive};
use crate::relocate::{elf, homebrew, macho, BinaryFormat};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(default)]
    formula: Option<String>,
}

pub struct HomebrewRelocate;

impl Action for HomebrewRelocate {
    fn name(&self) -> &'static str {
        "homebrew_relocate"
    }
}

#[async_trait]
impl Primitive for HomebrewRelocate {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let _p: Params = params::decode(raw_params)?;
        let final_install_path = ctx.tool_install_dir.display().to_string();

        let plan = homebrew::plan_relocation(&ctx.work_dir, &final_install_path)?;
        let rpath = match ctx.platform.os {
            tsuku_schema::Os::Linux => "$ORIGIN/../lib",
            tsuku_schema::Os::MacOs => "@executable_path/../lib",
        };

        for binary in &plan.binaries_needing_rpath {
            match crate::relocate::detect_format(binary) {
                Some(BinaryFormat::Elf) => elf::set_rpath(binary, rpath)?,
                Some(BinaryFormat::MachO | BinaryFormat::FatMachO) => {
                    macho::set_rpath(binary, rpath)?
                }
                None => {}
            }
        }

        for binary in &plan.needs_wrapper {
            let original = binary.with_extension("orig");
            tokio::fs::rename(binary, &original).await?;
            let var = match ctx.platform.os {
                tsuku_schema::Os::Linux => "LD_LIBRARY_PATH",
                tsuku_schema::Os::MacOs => "DYLD_LIBRARY_PATH",
            };
            let orig_name = original
                .file_name()
                .ok_or_else(|| CoreError::BadParam("binary path has no filename".to_string()))?
                .to_string_lossy()
                .into_owned();
            validate_wrapper_filename(&orig_name)?;
            let script = format!(
                "#!/bin/sh\nSCRIPT_DIR=$(cd \"$(dirname \"$0\")\" && pwd)\nexport {var}=\"$SCRIPT_DIR/../lib\"\nexec \"$SCRIPT_DIR/{orig_name}\" \"$@\"\n"
            );
            tokio::fs::write(binary, script).await?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                tokio::fs::set_permissions(binary, std::fs::Permissions::from_mode(0o755)).await?;
            }
        }

        Ok(())
    }
}
