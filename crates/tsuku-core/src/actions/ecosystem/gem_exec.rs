//! `gem_exec` ecosystem builder (spec.md §4.10): installs a gem from a
//! captured `Gemfile.lock`, pinning Bundler to the version the lockfile
//! was generated with.

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::registry::{Action, Primitive};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct Params {
    gem: String,
    version: String,
    executables: Vec<String>,
    lock_data: String,
}

pub struct GemExec;

impl Action for GemExec {
    fn name(&self) -> &'static str {
        "gem_exec"
    }
}

fn gemfile_contents(gem: &str, version: &str) -> String {
    format!("source \"https://rubygems.org\"\ngem \"{gem}\", \"{version}\"\n")
}

/// Extracts the Bundler version pinned under `Gemfile.lock`'s trailing
/// `BUNDLED WITH` section.
fn bundled_with(lock_data: &str) -> Option<&str> {
    let (_, after) = lock_data.split_once("BUNDLED WITH")?;
    after.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Candidate wrapper directories probed in order, per spec.md §4.10's
/// "locates the wrapper directory by probing a fixed list" note.
const WRAPPER_CANDIDATES: &[&str] = &["bin", "gems/bin", "wrappers"];

async fn find_wrapper_dir(install_dir: &Path) -> Option<PathBuf> {
    for candidate in WRAPPER_CANDIDATES {
        let dir = install_dir.join(candidate);
        if tokio::fs::metadata(&dir).await.is_ok() {
            return Some(dir);
        }
    }
    None
}

#[async_trait]
impl Primitive for GemExec {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: Params = params::decode(raw_params)?;

        let source_dir = ctx.work_dir.join("src-gen");
        tokio::fs::create_dir_all(&source_dir).await?;
        tokio::fs::write(source_dir.join("Gemfile"), gemfile_contents(&p.gem, &p.version)).await?;
        tokio::fs::write(source_dir.join("Gemfile.lock"), &p.lock_data).await?;

        let mut env: BTreeMap<String, String> = ctx.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        env.insert("BUNDLE_FROZEN".to_string(), "true".to_string());
        env.insert("GEM_HOME".to_string(), ctx.install_dir.display().to_string());
        env.insert("GEM_PATH".to_string(), ctx.install_dir.display().to_string());
        env.insert("BUNDLE_PATH".to_string(), ctx.install_dir.display().to_string());
        env.insert("SOURCE_DATE_EPOCH".to_string(), "315619200".to_string());
        if let Some(bundler_version) = bundled_with(&p.lock_data) {
            env.insert("BUNDLER_VERSION".to_string(), bundler_version.to_string());
        }

        let config = tokio::process::Command::new("bundle")
            .args(["config", "set", "--local", "path"])
            .arg(&ctx.install_dir)
            .current_dir(&source_dir)
            .env_clear()
            .envs(&env)
            .env("PATH", ctx.build_path_env())
            .output()
            .await?;
        if !config.status.success() {
            return Err(CoreError::SubprocessFailed {
                command: "bundle config set --local path".to_string(),
                status: config.status.to_string(),
                stderr: String::from_utf8_lossy(&config.stderr).into_owned(),
            });
        }

        let install = tokio::process::Command::new("bundle")
            .args(["install"])
            .current_dir(&source_dir)
            .env_clear()
            .envs(&env)
            .env("PATH", ctx.build_path_env())
            .output()
            .await?;
        if !install.status.success() {
            return Err(CoreError::SubprocessFailed {
                command: "bundle install".to_string(),
                status: install.status.to_string(),
                stderr: String::from_utf8_lossy(&install.stderr).into_owned(),
            });
        }

        let wrapper_dir = find_wrapper_dir(&ctx.install_dir)
            .await
            .ok_or_else(|| CoreError::BadParam("no gem wrapper directory found after bundle install".to_string()))?;

        tokio::fs::create_dir_all(ctx.install_dir.join("bin")).await?;
        for exe in &p.executables {
            let target = wrapper_dir.join(exe);
            let link = ctx.install_dir.join("bin").join(exe);
            if tokio::fs::symlink_metadata(&link).await.is_ok() {
                tokio::fs::remove_file(&link).await?;
            }
            let relative = pathdiff(&target, ctx.install_dir.join("bin").as_path())
                .ok_or_else(|| CoreError::BadParam(format!("cannot relativize wrapper path for {exe}")))?;
            #[cfg(unix)]
            tokio::fs::symlink(&relative, &link).await?;
        }

        Ok(())
    }
}

fn pathdiff(target: &Path, base: &Path) -> Option<PathBuf> {
    let target_components: Vec<_> = target.components().collect();
    let base_components: Vec<_> = base.components().collect();

    let common = target_components
        .iter()
        .zip(base_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..base_components.len() {
        result.push("..");
    }
    for component in &target_components[common..] {
        result.push(component.as_os_str());
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_with_extracts_pinned_version() {
        let lock = "GEM\n  remote: https://rubygems.org/\n\nBUNDLED WITH\n   2.5.6\n";
        assert_eq!(bundled_with(lock), Some("2.5.6"));
    }

    #[test]
    fn bundled_with_is_none_without_section() {
        assert_eq!(bundled_with("GEM\n  remote: https://rubygems.org/\n"), None);
    }

    #[test]
    fn pathdiff_computes_relative_sibling_path() {
        let target = Path::new("/tsuku/install/gems/bin/rails");
        let base = Path::new("/tsuku/install/bin");
        assert_eq!(pathdiff(target, base), Some(PathBuf::from("../gems/bin/rails")));
    }
}
