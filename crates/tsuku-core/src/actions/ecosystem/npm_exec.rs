//! `npm_exec` ecosystem builder (spec.md §4.10): installs from a captured
//! `package-lock.json` with `npm ci`, fully offline and script-free.

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::registry::{Action, Primitive};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct Params {
    package: String,
    version: String,
    executables: Vec<String>,
    package_lock: String,
    #[serde(default)]
    has_native_addons: bool,
}

pub struct NpmExec;

impl Action for NpmExec {
    fn name(&self) -> &'static str {
        "npm_exec"
    }
}

fn package_json(package: &str, version: &str) -> String {
    let mut dependencies = serde_json::Map::new();
    dependencies.insert(package.to_string(), serde_json::Value::String(version.to_string()));

    serde_json::json!({
        "name": "tsuku-npm-exec",
        "private": true,
        "version": "0.0.0",
        "dependencies": dependencies,
    })
    .to_string()
}

#[async_trait]
impl Primitive for NpmExec {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: Params = params::decode(raw_params)?;

        if p.has_native_addons {
            tracing::warn!(
                package = %p.package,
                "installing an npm package with native-addon indicators; build toolchain must be present"
            );
        }

        let source_dir = ctx.work_dir.join("src-gen");
        tokio::fs::create_dir_all(&source_dir).await?;
        tokio::fs::write(source_dir.join("package.json"), package_json(&p.package, &p.version)).await?;
        tokio::fs::write(source_dir.join("package-lock.json"), &p.package_lock).await?;

        let ci = tokio::process::Command::new("npm")
            .args(["ci", "--ignore-scripts", "--no-audit", "--no-fund", "--prefer-offline"])
            .arg(format!("--prefix={}", ctx.install_dir.display()))
            .current_dir(&source_dir)
            .env_clear()
            .envs(ctx.env.iter())
            .env("PATH", ctx.build_path_env())
            .output()
            .await?;
        if !ci.status.success() {
            let stderr = String::from_utf8_lossy(&ci.stderr);
            if stderr.contains("package.json and package-lock.json")
                || stderr.contains("in sync")
                || stderr.contains("EUSAGE")
            {
                return Err(CoreError::LockfileDriftDetected(format!(
                    "npm ci: package-lock.json for {package}@{version} is out of sync with package.json",
                    package = p.package,
                    version = p.version,
                )));
            }
            return Err(CoreError::SubprocessFailed {
                command: "npm ci --ignore-scripts --no-audit --no-fund --prefer-offline".to_string(),
                status: ci.status.to_string(),
                stderr: stderr.into_owned(),
            });
        }

        for exe in &p.executables {
            let in_bin = ctx.install_dir.join("bin").join(exe);
            let in_dot_bin = ctx.install_dir.join("lib/node_modules/.bin").join(exe);
            if tokio::fs::metadata(&in_bin).await.is_err()
                && tokio::fs::metadata(&in_dot_bin).await.is_err()
            {
                return Err(CoreError::BadParam(format!(
                    "executable {exe} not found under install_dir/bin or install_dir/lib/node_modules/.bin"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_json_pins_single_dependency() {
        let json = package_json("left-pad", "1.3.0");
        assert!(json.contains("\"left-pad\":\"1.3.0\"") || json.contains("\"left-pad\": \"1.3.0\""));
    }
}
