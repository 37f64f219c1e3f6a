//! `pip_exec` ecosystem builder (spec.md §4.10): installs hashed,
//! dependency-free wheels into a relocatable venv built on a sibling
//! `python-standalone-*` interpreter.

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
    executables: Vec<String>,
    requirements_txt: String,
}

pub struct PipExec;

impl Action for PipExec {
    fn name(&self) -> &'static str {
        "pip_exec"
    }
}

/// Finds the sibling `python-standalone-*` tool install among this
/// install's resolved dependencies.
fn find_python_standalone(ctx: &ExecutionContext) -> Result<PathBuf, CoreError> {
    for name in ctx.dependencies.keys() {
        if name.as_str().starts_with("python-standalone") {
            let version = &ctx.dependencies[name];
            return Ok(ctx.tools_dir.join(format!("{name}-{}", version.as_str())));
        }
    }
    Err(CoreError::BadParam(
        "pip_exec requires a python-standalone dependency".to_string(),
    ))
}

const POLYGLOT_SHEBANG: &str =
    "#!/bin/sh\n''':'\nexec \"$(dirname \"$0\")/python3\" \"$0\" \"$@\"\n'''\n";

#[async_trait]
impl Primitive for PipExec {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: Params = params::decode(raw_params)?;

        if !p.requirements_txt.contains("--hash=") {
            return Err(CoreError::BadParam(
                "pip_exec requires a requirements file with --hash= entries".to_string(),
            ));
        }

        let python_root = find_python_standalone(ctx)?;
        let python_bin = python_root.join("bin/python3");

        let venv_dir = ctx.install_dir.clone();
        let venv = tokio::process::Command::new(&python_bin)
            .args(["-m", "venv", "--without-pip"])
            .arg(&venv_dir)
            .env_clear()
            .envs(ctx.env.iter())
            .output()
            .await?;
        if !venv.status.success() {
            return Err(CoreError::SubprocessFailed {
                command: format!("{} -m venv --without-pip", python_bin.display()),
                status: venv.status.to_string(),
                stderr: String::from_utf8_lossy(&venv.stderr).into_owned(),
            });
        }

        let requirements_path = ctx.work_dir.join("requirements.txt");
        tokio::fs::write(&requirements_path, &p.requirements_txt).await?;

        let ensurepip = tokio::process::Command::new(&python_bin)
            .args(["-m", "ensurepip", "--default-pip"])
            .env_clear()
            .env("VIRTUAL_ENV", &venv_dir)
            .output()
            .await?;
        if !ensurepip.status.success() {
            return Err(CoreError::SubprocessFailed {
                command: "python3 -m ensurepip --default-pip".to_string(),
                status: ensurepip.status.to_string(),
                stderr: String::from_utf8_lossy(&ensurepip.stderr).into_owned(),
            });
        }

        let venv_python = venv_dir.join("bin/python3");
        let install = tokio::process::Command::new(&venv_python)
            .args([
                "-m",
                "pip",
                "install",
                "--require-hashes",
                "--no-deps",
                "--only-binary",
                ":all:",
                "--disable-pip-version-check",
                "-r",
            ])
            .arg(&requirements_path)
            .env_clear()
            .env("VIRTUAL_ENV", &venv_dir)
            .output()
            .await?;
        if !install.status.success() {
            return Err(CoreError::SubprocessFailed {
                command: "pip install --require-hashes --no-deps --only-binary :all:".to_string(),
                status: install.status.to_string(),
                stderr: String::from_utf8_lossy(&install.stderr).into_owned(),
            });
        }

        relocate_python_symlink(&venv_dir, &python_root).await?;
        rewrite_shebangs(&venv_dir.join("bin")).await?;

        for exe in &p.executables {
            let script = venv_dir.join("bin").join(exe);
            if tokio::fs::metadata(&script).await.is_err() {
                return Err(CoreError::BadParam(format!(
                    "executable {exe} not found in venv after install"
                )));
            }
        }

        Ok(())
    }
}

/// Rewrites the venv's `bin/python3` symlink to a relative path into the
/// sibling `python-standalone-*` install, so the venv stays valid after
/// being promoted to its final content-addressed directory.
async fn relocate_python_symlink(venv_dir: &Path, python_root: &Path) -> Result<(), CoreError> {
    let link = venv_dir.join("bin/python3");
    if tokio::fs::symlink_metadata(&link).await.is_ok() {
        tokio::fs::remove_file(&link).await?;
    }
    let target = python_root.join("bin/python3");
    let relative = pathdiff(&target, venv_dir.join("bin").as_path())
        .ok_or_else(|| CoreError::BadParam("cannot relativize venv python3 symlink".to_string()))?;
    #[cfg(unix)]
    tokio::fs::symlink(&relative, &link).await?;
    Ok(())
}

/// Rewrites every script in `bin_dir` whose first line starts with `#!` and
/// references a python interpreter to the polyglot shebang, so scripts keep
/// working after the venv's absolute paths move.
async fn rewrite_shebangs(bin_dir: &Path) -> Result<(), CoreError> {
    let mut entries = tokio::fs::read_dir(bin_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.file_name().and_then(|n| n.to_str()) == Some("python3") {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(_) => continue,
        };
        if let Some(rest) = contents.strip_prefix("#!") {
            let first_line_end = rest.find('\n').unwrap_or(rest.len());
            let shebang_line = &rest[..first_line_end];
            if shebang_line.contains("python") {
                let body = &rest[first_line_end..];
                let rewritten = format!("{POLYGLOT_SHEBANG}{body}");
                tokio::fs::write(&path, rewritten).await?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).await?;
                }
            }
        }
    }
    Ok(())
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
    fn polyglot_shebang_matches_spec_wording() {
        assert!(POLYGLOT_SHEBANG.starts_with("#!/bin/sh\n"));
        assert!(POLYGLOT_SHEBANG.contains("exec \"$(dirname \"$0\")/python3\""));
    }

    #[test]
    fn pathdiff_relativizes_sibling_tool_install() {
        let target = Path::new("/tsuku/tools/python-standalone-3.12.0/bin/python3");
        let base = Path::new("/tsuku/tools/jq-1.7/bin");
        assert_eq!(
            pathdiff(target, base),
            Some(PathBuf::from("../../python-standalone-3.12.0/bin/python3"))
        );
    }
}
