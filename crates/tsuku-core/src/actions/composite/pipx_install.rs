//! `pipx_install` composite (spec.md §4.9): resolves a hashed, offline
//! requirements file for `pip_exec`, preferring `pip-compile` and falling
//! back to hashing downloaded wheels directly.

use crate::actions::params;
use crate::context::EvalContext;
use crate::error::CoreError;
use crate::io::verify::{hash_bytes, ChecksumAlgorithm};
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

pub struct PipxInstall;

impl Action for PipxInstall {
    fn name(&self) -> &'static str {
        "pipx_install"
    }

    fn requires_network(&self) -> bool {
        true
    }
}

async fn pip_compile_available() -> bool {
    which::which("pip-compile").is_ok()
}

async fn compile_with_pip_compile(package_spec: &str) -> Result<String, CoreError> {
    let scratch = tempfile::tempdir()?;
    tokio::fs::write(scratch.path().join("requirements.in"), format!("{package_spec}\n")).await?;

    let output = Command::new("pip-compile")
        .args(["--generate-hashes", "--output-file=requirements.txt", "requirements.in"])
        .current_dir(scratch.path())
        .output()
        .await?;
    if !output.status.success() {
        return Err(CoreError::SubprocessFailed {
            command: "pip-compile --generate-hashes".to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(tokio::fs::read_to_string(scratch.path().join("requirements.txt")).await?)
}

async fn compile_with_pip_download(package_spec: &str) -> Result<String, CoreError> {
    let scratch = tempfile::tempdir()?;
    let wheel_dir = scratch.path().join("wheels");
    tokio::fs::create_dir_all(&wheel_dir).await?;

    let output = Command::new("pip")
        .args(["download", "--no-deps", "--dest"])
        .arg(&wheel_dir)
        .arg(package_spec)
        .output()
        .await?;
    if !output.status.success() {
        return Err(CoreError::SubprocessFailed {
            command: format!("pip download {package_spec}"),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let mut requirements = format!("{package_spec}");
    let mut entries = tokio::fs::read_dir(&wheel_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let bytes = tokio::fs::read(entry.path()).await?;
        let digest = hash_bytes(&bytes, ChecksumAlgorithm::Sha256);
        requirements.push_str(&format!(" --hash=sha256:{digest}"));
    }
    requirements.push('\n');

    Ok(requirements)
}

#[async_trait]
impl Composite for PipxInstall {
    async fn decompose(
        &self,
        eval_ctx: &EvalContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Vec<Step>, CoreError> {
        let p: Params = params::decode(raw_params)?;
        let version = eval_ctx.version.as_str();
        let package_spec = format!("{}=={version}", p.package);

        let requirements = if pip_compile_available().await {
            compile_with_pip_compile(&package_spec).await?
        } else {
            compile_with_pip_download(&package_spec).await?
        };

        if !requirements.contains("--hash=") {
            return Err(CoreError::BadParam(
                "resolved requirements file carries no --hash entries".to_string(),
            ));
        }

        let executables = if p.executables.is_empty() {
            vec![p.package.clone()]
        } else {
            p.executables
        };

        Ok(vec![Step::new("pip_exec")
            .with_param("package", p.package)
            .with_param("version", version.to_string())
            .with_param("executables", executables)
            .with_param("requirements_txt", requirements)])
    }
}
