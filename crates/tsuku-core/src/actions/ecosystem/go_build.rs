//! `go_build` ecosystem builder (spec.md §4.10): two-pass `go mod
//! download`+`verify` against the real proxy, then an offline
//! `go install` against the captured `go.sum`.

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::registry::{Action, Primitive};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct Params {
    module: String,
    version: String,
    go_sum: String,
}

pub struct GoBuild;

impl Action for GoBuild {
    fn name(&self) -> &'static str {
        "go_build"
    }
}

fn go_mod_contents(module: &str) -> String {
    format!("module tsuku-go-build\n\ngo 1.22\n\nrequire {module} v0.0.0\n")
}

/// Inherited env with every `GO*` variable stripped, per spec.md §4.10's
/// "forbids GO* env inheritance" note.
fn filtered_env(ctx: &ExecutionContext) -> BTreeMap<String, String> {
    ctx.env
        .iter()
        .filter(|(k, _)| !k.starts_with("GO"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[async_trait]
impl Primitive for GoBuild {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: Params = params::decode(raw_params)?;

        let source_dir = ctx.work_dir.join("src-gen");
        tokio::fs::create_dir_all(&source_dir).await?;
        tokio::fs::write(source_dir.join("go.mod"), go_mod_contents(&p.module)).await?;
        tokio::fs::write(source_dir.join("go.sum"), &p.go_sum).await?;

        let gomodcache = ctx.tools_dir.join(".gomodcache");
        tokio::fs::create_dir_all(&gomodcache).await?;

        let mut env = filtered_env(ctx);
        env.insert("GOBIN".to_string(), ctx.install_dir.join("bin").display().to_string());
        env.insert("GOMODCACHE".to_string(), gomodcache.display().to_string());
        env.insert("CGO_ENABLED".to_string(), "0".to_string());

        let mut download_env = env.clone();
        download_env.insert("HOME".to_string(), ctx.work_dir.display().to_string());

        let download = tokio::process::Command::new("go")
            .args(["mod", "download"])
            .current_dir(&source_dir)
            .env_clear()
            .envs(&download_env)
            .env("PATH", ctx.build_path_env())
            .output()
            .await?;
        if !download.status.success() {
            return Err(CoreError::SubprocessFailed {
                command: "go mod download".to_string(),
                status: download.status.to_string(),
                stderr: String::from_utf8_lossy(&download.stderr).into_owned(),
            });
        }

        let verify = tokio::process::Command::new("go")
            .args(["mod", "verify"])
            .current_dir(&source_dir)
            .env_clear()
            .envs(&download_env)
            .env("PATH", ctx.build_path_env())
            .output()
            .await?;
        if !verify.status.success() {
            let stdout = String::from_utf8_lossy(&verify.stdout);
            let stderr = String::from_utf8_lossy(&verify.stderr);
            if stdout.contains("checksum mismatch") || stderr.contains("checksum mismatch") {
                return Err(CoreError::LockfileDriftDetected(format!(
                    "go mod verify: {module} {version} does not match the captured go.sum",
                    module = p.module,
                    version = p.version,
                )));
            }
            return Err(CoreError::SubprocessFailed {
                command: "go mod verify".to_string(),
                status: verify.status.to_string(),
                stderr: stderr.into_owned(),
            });
        }

        tokio::fs::create_dir_all(ctx.install_dir.join("bin")).await?;

        let mut offline_env = env.clone();
        offline_env.insert("GOPROXY".to_string(), "off".to_string());
        offline_env.insert("GOSUMDB".to_string(), "off".to_string());

        let target = format!("{}@{}", p.module, p.version);
        let install = tokio::process::Command::new("go")
            .args(["install", "-trimpath", "-buildvcs=false"])
            .arg(&target)
            .current_dir(&source_dir)
            .env_clear()
            .envs(&offline_env)
            .env("PATH", ctx.build_path_env())
            .output()
            .await?;
        if !install.status.success() {
            return Err(CoreError::SubprocessFailed {
                command: format!("go install -trimpath -buildvcs=false {target}"),
                status: install.status.to_string(),
                stderr: String::from_utf8_lossy(&install.stderr).into_owned(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_mod_contents_requires_target_module() {
        assert!(go_mod_contents("github.com/jqlang/jq").contains("require github.com/jqlang/jq"));
    }
}
