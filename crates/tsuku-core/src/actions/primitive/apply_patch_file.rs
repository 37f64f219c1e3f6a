//! `apply_patch_file` primitive (spec.md §4.9): applies a unified diff,
//! either already downloaded into `work_dir` or supplied inline, against a
//! subtree of `work_dir` via the system `patch` binary.

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::paths::ensure_within;
use crate::registry::{Action, Primitive};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(default)]
    patch: Option<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    subdir: Option<String>,
}

pub struct ApplyPatchFile;

impl Action for ApplyPatchFile {
    fn name(&self) -> &'static str {
        "apply_patch_file"
    }
}

#[async_trait]
impl Primitive for ApplyPatchFile {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: Params = params::decode(raw_params)?;

        let patch_path = match (&p.patch, &p.data) {
            (Some(patch), None) => ensure_within(&ctx.work_dir.join(patch), &ctx.work_dir)?,
            (None, Some(data)) => {
                let inline = ctx.work_dir.join(".tsuku-apply-patch.diff");
                tokio::fs::write(&inline, data).await?;
                inline
            }
            _ => {
                return Err(CoreError::BadParam(
                    "apply_patch_file requires exactly one of patch or data".to_string(),
                ));
            }
        };

        let target_dir = match &p.subdir {
            Some(subdir) => ensure_within(&ctx.work_dir.join(subdir), &ctx.work_dir)?,
            None => ctx.work_dir.clone(),
        };

        let output = tokio::process::Command::new("patch")
            .args(["-p1", "-i"])
            .arg(&patch_path)
            .current_dir(&target_dir)
            .env_clear()
            .envs(ctx.env.iter())
            .env("PATH", ctx.build_path_env())
            .output()
            .await?;

        if p.data.is_some() {
            let _ = tokio::fs::remove_file(&patch_path).await;
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(CoreError::SubprocessFailed {
                command: format!("patch -p1 -i {}", patch_path.display()),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_matches_emitted_step_action() {
        assert_eq!(ApplyPatchFile.name(), "apply_patch_file");
    }
}
