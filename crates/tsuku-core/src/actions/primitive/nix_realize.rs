//! `nix_realize` primitive (spec.md §4.9): realises the store path pinned
//! by `nix_install` at plan time, re-verifies its NAR hash, and copies it
//! into `install_dir`.

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::registry::{Action, Primitive};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Params {
    flake_ref: String,
    store_path: String,
    nar_hash: String,
}

pub struct NixRealize;

impl Action for NixRealize {
    fn name(&self) -> &'static str {
        "nix_realize"
    }

    fn requires_network(&self) -> bool {
        true
    }
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
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(entry.path(), &target).await?;
        }
    }
    Ok(())
}

#[async_trait]
impl Primitive for NixRealize {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: Params = params::decode(raw_params)?;

        let build = tokio::process::Command::new("nix")
            .arg("build")
            .arg(&p.flake_ref)
            .args([
                "--extra-experimental-features",
                "nix-command flakes",
                "--no-link",
                "--print-out-paths",
            ])
            .env_clear()
            .envs(ctx.env.iter())
            .env("PATH", ctx.build_path_env())
            .output()
            .await?;
        if !build.status.success() {
            return Err(CoreError::SubprocessFailed {
                command: format!("nix build {}", p.flake_ref),
                status: build.status.to_string(),
                stderr: String::from_utf8_lossy(&build.stderr).into_owned(),
            });
        }
        let realized_path = String::from_utf8_lossy(&build.stdout).trim().to_string();
        if realized_path != p.store_path {
            return Err(CoreError::BadParam(format!(
                "nix build produced {realized_path}, expected pinned store path {}",
                p.store_path
            )));
        }

        let hash_output = tokio::process::Command::new("nix")
            .args(["hash", "path"])
            .arg(&p.store_path)
            .env_clear()
            .envs(ctx.env.iter())
            .env("PATH", ctx.build_path_env())
            .output()
            .await?;
        if !hash_output.status.success() {
            return Err(CoreError::SubprocessFailed {
                command: format!("nix hash path {}", p.store_path),
                status: hash_output.status.to_string(),
                stderr: String::from_utf8_lossy(&hash_output.stderr).into_owned(),
            });
        }
        let actual_hash = String::from_utf8_lossy(&hash_output.stdout).trim().to_string();
        if actual_hash != p.nar_hash {
            return Err(CoreError::ChecksumMismatch {
                expected: p.nar_hash,
                actual: actual_hash,
            });
        }

        copy_tree(Path::new(&p.store_path), &ctx.install_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_matches_emitted_step_action() {
        assert_eq!(NixRealize.name(), "nix_realize");
    }
}
