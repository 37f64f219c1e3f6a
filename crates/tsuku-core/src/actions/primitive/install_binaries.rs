//! `install_binaries` primitive (spec.md §4.8).
//!
//! `directory_wrapped` is reserved but left unimplemented per spec.md §9's
//! open question: its wrapping policy was never specified.

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::paths::ensure_within;
use crate::registry::{Action, Primitive};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum InstallMode {
    #[default]
    Binaries,
    Directory,
    DirectoryWrapped,
}

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(default)]
    outputs: Option<HashMap<String, String>>,
    #[serde(default)]
    binaries: Option<HashMap<String, String>>,
    #[serde(default)]
    install_mode: InstallMode,
}

async fn copy_file(src: &Path, dest: &Path) -> Result<(), CoreError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(src, dest).await?;
    Ok(())
}

async fn copy_tree(src_root: &Path, dest_root: &Path) -> Result<(), CoreError> {
    for entry in walkdir::WalkDir::new(src_root) {
        let entry = entry.map_err(|e| {
            let message = e.to_string();
            CoreError::Io(e.into_io_error().unwrap_or_else(|| std::io::Error::other(message)))
        })?;
        let relative = entry.path().strip_prefix(src_root).unwrap_or(entry.path());
        let target = dest_root.join(relative);

        if entry.file_type().is_dir() {
            tokio::fs::create_dir_all(&target).await?;
        } else if entry.file_type().is_symlink() {
            let link = tokio::fs::read_link(entry.path()).await?;
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            #[cfg(unix)]
            tokio::fs::symlink(link, &target).await?;
        } else {
            copy_file(entry.path(), &target).await?;
        }
    }
    Ok(())
}

pub struct InstallBinaries;

impl Action for InstallBinaries {
    fn name(&self) -> &'static str {
        "install_binaries"
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

#[async_trait]
impl Primitive for InstallBinaries {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: Params = params::decode(raw_params)?;

        let result = match p.install_mode {
            InstallMode::Binaries => {
                let mapping = p
                    .outputs
                    .or(p.binaries)
                    .ok_or_else(|| CoreError::BadParam("binaries mode requires outputs/binaries".to_string()))?;

                install_listed(ctx, &mapping).await
            }
            InstallMode::Directory => {
                if !ctx.verify_declared {
                    Err(CoreError::BadParam(
                        "directory install mode requires the recipe to declare a verify command"
                            .to_string(),
                    ))
                } else {
                    copy_tree(&ctx.work_dir, &ctx.install_dir).await
                }
            }
            InstallMode::DirectoryWrapped => Err(CoreError::BadParam(
                "directory_wrapped install mode is reserved and not yet implemented".to_string(),
            )),
        };

        if result.is_err() {
            let _ = tokio::fs::remove_dir_all(&ctx.install_dir).await;
            tokio::fs::create_dir_all(&ctx.install_dir).await?;
        }

        result
    }
}

async fn install_listed(
    ctx: &ExecutionContext,
    mapping: &HashMap<String, String>,
) -> Result<(), CoreError> {
    for (src, dest) in mapping {
        let src_path = ensure_within(&ctx.work_dir.join(src), &ctx.work_dir)?;
        let dest_path = ensure_within(&ctx.install_dir.join(dest), &ctx.install_dir)?;
        copy_file(&src_path, &dest_path).await?;
    }
    Ok(())
}
