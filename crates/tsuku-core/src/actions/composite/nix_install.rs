//! `nix_install` composite (spec.md §4.9): resolves a package through a Nix
//! flake reference and pins the resulting store path's NAR hash at plan
//! time, so the `nix_realize` step it emits can fetch and verify that exact
//! path deterministically rather than invoking `nix build` at execution
//! time.

use crate::actions::params;
use crate::context::EvalContext;
use crate::error::CoreError;
use crate::plan::Step;
use crate::registry::{Action, Composite};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tokio::process::Command;

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(rename = "attr")]
    attribute: String,
    #[serde(default = "default_channel")]
    channel: String,
}

fn default_channel() -> String {
    "nixpkgs-unstable".to_string()
}

pub struct NixInstall;

impl Action for NixInstall {
    fn name(&self) -> &'static str {
        "nix_install"
    }

    fn requires_network(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
struct NixDerivationShow {
    #[serde(flatten)]
    drvs: std::collections::HashMap<String, DrvInfo>,
}

#[derive(Debug, Deserialize)]
struct DrvInfo {
    outputs: std::collections::HashMap<String, DrvOutput>,
}

#[derive(Debug, Deserialize)]
struct DrvOutput {
    path: String,
}

/// `nix path-info --json <installable>` reports the resolved store path and
/// NAR hash without building or downloading anything.
async fn resolve_store_path(flake_ref: &str) -> Result<(String, String), CoreError> {
    let output = Command::new("nix")
        .args(["path-info", "--json", "--derivation", flake_ref])
        .output()
        .await?;
    if !output.status.success() {
        return Err(CoreError::SubprocessFailed {
            command: format!("nix path-info --json --derivation {flake_ref}"),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let show: NixDerivationShow = serde_json::from_slice(&output.stdout).map_err(|e| {
        CoreError::BadParam(format!("unparsable nix path-info output: {e}"))
    })?;
    let drv = show.drvs.into_values().next().ok_or_else(|| {
        CoreError::BadParam("nix path-info returned no derivations".to_string())
    })?;
    let out = drv
        .outputs
        .get("out")
        .ok_or_else(|| CoreError::BadParam("derivation carries no `out` output".to_string()))?;

    let hash_output = Command::new("nix")
        .args(["hash", "path"])
        .arg(&out.path)
        .output()
        .await?;
    if !hash_output.status.success() {
        return Err(CoreError::SubprocessFailed {
            command: format!("nix hash path {}", out.path),
            status: hash_output.status.to_string(),
            stderr: String::from_utf8_lossy(&hash_output.stderr).into_owned(),
        });
    }
    let nar_hash = String::from_utf8_lossy(&hash_output.stdout).trim().to_string();

    Ok((out.path.clone(), nar_hash))
}

#[async_trait]
impl Composite for NixInstall {
    async fn decompose(
        &self,
        eval_ctx: &EvalContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Vec<Step>, CoreError> {
        let p: Params = params::decode(raw_params)?;
        let version = eval_ctx.version.as_str();
        let flake_ref = format!("{}#{}", p.channel, p.attribute);

        let (store_path, nar_hash) = resolve_store_path(&flake_ref).await?;

        Ok(vec![Step::new("nix_realize")
            .with_param("flake_ref", flake_ref)
            .with_param("store_path", store_path)
            .with_param("nar_hash", nar_hash)
            .with_param("version", version.to_string())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_channel_is_nixpkgs_unstable() {
        assert_eq!(default_channel(), "nixpkgs-unstable");
    }
}
