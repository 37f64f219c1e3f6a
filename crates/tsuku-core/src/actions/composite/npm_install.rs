//! `npm_install` composite (spec.md §4.9): captures a `package-lock.json`
//! and native-addon indicators at plan time.

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
    package: String,
    #[serde(default)]
    executables: Vec<String>,
}

pub struct NpmInstall;

impl Action for NpmInstall {
    fn name(&self) -> &'static str {
        "npm_install"
    }

    fn requires_network(&self) -> bool {
        true
    }
}

fn package_json(package: &str, version: &str) -> String {
    let mut dependencies = serde_json::Map::new();
    dependencies.insert(package.to_string(), serde_json::Value::String(version.to_string()));

    serde_json::json!({
        "name": "tsuku-npm-scratch",
        "private": true,
        "version": "0.0.0",
        "dependencies": dependencies,
    })
    .to_string()
}

/// Scans a captured `package-lock.json` for signs the package (or any of
/// its dependencies) builds a native addon.
fn has_native_addon_indicators(package_lock: &str) -> bool {
    const INDICATORS: &[&str] = &["gypfile", "hasInstallScript", "node-gyp"];
    INDICATORS.iter().any(|marker| package_lock.contains(marker))
}

#[async_trait]
impl Composite for NpmInstall {
    async fn decompose(
        &self,
        eval_ctx: &EvalContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Vec<Step>, CoreError> {
        let p: Params = params::decode(raw_params)?;
        let version = eval_ctx.version.as_str();

        let scratch = tempfile::tempdir()?;
        tokio::fs::write(
            scratch.path().join("package.json"),
            package_json(&p.package, version),
        )
        .await?;

        let output = Command::new("npm")
            .args(["install", "--package-lock-only"])
            .current_dir(scratch.path())
            .output()
            .await?;
        if !output.status.success() {
            return Err(CoreError::SubprocessFailed {
                command: "npm install --package-lock-only".to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let package_lock =
            tokio::fs::read_to_string(scratch.path().join("package-lock.json")).await?;
        let has_native_addons = has_native_addon_indicators(&package_lock);

        let executables = if p.executables.is_empty() {
            vec![p.package.clone()]
        } else {
            p.executables
        };

        Ok(vec![Step::new("npm_exec")
            .with_param("package", p.package)
            .with_param("version", version.to_string())
            .with_param("executables", executables)
            .with_param("package_lock", package_lock)
            .with_param("has_native_addons", has_native_addons)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_native_addon_indicators_detects_gypfile() {
        assert!(has_native_addon_indicators(r#"{"gypfile": true}"#));
    }

    #[test]
    fn has_native_addon_indicators_false_for_plain_lockfile() {
        assert!(!has_native_addon_indicators(r#"{"lockfileVersion": 3}"#));
    }
}
