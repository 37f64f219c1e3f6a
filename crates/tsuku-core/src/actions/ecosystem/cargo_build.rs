//! `cargo_build` ecosystem builder (spec.md §4.10): fetches the crate's own
//! published tarball from the static crates.io CDN, overlays the `Cargo.lock`
//! captured at plan time, and installs from that real source tree so `cargo
//! install` sees the crate's own `[[bin]]` targets instead of a synthetic
//! wrapper package.

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::io::extract::{self, ArchiveFormat};
use crate::io::fetch;
use crate::registry::{Action, Primitive};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(rename = "crate")]
    crate_name: String,
    version: String,
    #[serde(default)]
    bins: Vec<String>,
    #[serde(default)]
    features: Vec<String>,
    lock_data: String,
    checksum: String,
    #[serde(default)]
    target: Option<String>,
}

pub struct CargoBuild;

impl Action for CargoBuild {
    fn name(&self) -> &'static str {
        "cargo_build"
    }
}

const TARGET_TRIPLE_RE: &str = r"^[A-Za-z0-9_]+(-[A-Za-z0-9_]+){2,3}$";
const FEATURE_NAME_RE: &str = r"^[A-Za-z0-9_][A-Za-z0-9_/-]{0,99}$";

fn validate_target_triple(triple: &str) -> Result<(), CoreError> {
    if triple.len() > 100 {
        return Err(CoreError::BadParam(format!("target triple too long: {triple}")));
    }
    let re = regex::Regex::new(TARGET_TRIPLE_RE).expect("static regex is valid");
    if re.is_match(triple) {
        Ok(())
    } else {
        Err(CoreError::BadParam(format!("unsafe target triple: {triple}")))
    }
}

fn validate_feature_name(feature: &str) -> Result<(), CoreError> {
    let re = regex::Regex::new(FEATURE_NAME_RE).expect("static regex is valid");
    if re.is_match(feature) {
        Ok(())
    } else {
        Err(CoreError::BadParam(format!("unsafe feature name: {feature}")))
    }
}

fn tarball_url(crate_name: &str, version: &str) -> String {
    format!("https://static.crates.io/crates/{crate_name}/{crate_name}-{version}.crate")
}

#[async_trait]
impl Primitive for CargoBuild {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: Params = params::decode(raw_params)?;

        for feature in &p.features {
            validate_feature_name(feature)?;
        }

        let archive_path = ctx.work_dir.join(format!("{}-{}.crate", p.crate_name, p.version));
        let client = fetch::build_client()?;
        let result = fetch::fetch(
            &client,
            &tarball_url(&p.crate_name, &p.version),
            &archive_path,
            &ctx.cancel,
        )
        .await?;
        if !result.sha256.eq_ignore_ascii_case(&p.checksum) {
            return Err(CoreError::ChecksumMismatch {
                expected: p.checksum,
                actual: result.sha256,
            });
        }

        let source_dir = ctx.work_dir.join("src-gen");
        tokio::fs::create_dir_all(&source_dir).await?;
        extract::extract(&archive_path, &source_dir, Some(ArchiveFormat::TarGz), 1)?;
        tokio::fs::write(source_dir.join("Cargo.lock"), &p.lock_data).await?;

        let cargo_home = ctx.work_dir.join(".cargo-home");
        tokio::fs::create_dir_all(&cargo_home).await?;

        if let Some(triple) = &p.target {
            validate_target_triple(triple)?;
        }

        let mut env: BTreeMap<String, String> = ctx.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        env.insert("CARGO_INCREMENTAL".to_string(), "0".to_string());
        env.insert("SOURCE_DATE_EPOCH".to_string(), "0".to_string());
        env.insert("CARGO_HOME".to_string(), cargo_home.display().to_string());

        let fetch = tokio::process::Command::new("cargo")
            .args(["fetch", "--locked"])
            .current_dir(&source_dir)
            .env_clear()
            .envs(&env)
            .env("PATH", ctx.build_path_env())
            .output()
            .await?;
        if !fetch.status.success() {
            return Err(CoreError::SubprocessFailed {
                command: "cargo fetch --locked".to_string(),
                status: fetch.status.to_string(),
                stderr: String::from_utf8_lossy(&fetch.stderr).into_owned(),
            });
        }

        let mut install_args = vec![
            "install".to_string(),
            "--locked".to_string(),
            "--offline".to_string(),
            "--path".to_string(),
            source_dir.display().to_string(),
            "--root".to_string(),
            ctx.install_dir.display().to_string(),
        ];
        for bin in &p.bins {
            install_args.push("--bin".to_string());
            install_args.push(bin.clone());
        }
        if !p.features.is_empty() {
            install_args.push("--features".to_string());
            install_args.push(p.features.join(","));
        }
        if let Some(triple) = &p.target {
            install_args.push("--target".to_string());
            install_args.push(triple.clone());
        }

        let install = tokio::process::Command::new("cargo")
            .args(&install_args)
            .current_dir(&source_dir)
            .env_clear()
            .envs(&env)
            .env("PATH", ctx.build_path_env())
            .output()
            .await?;
        if !install.status.success() {
            return Err(CoreError::SubprocessFailed {
                command: format!("cargo {}", install_args.join(" ")),
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
    fn validate_target_triple_accepts_standard_triples() {
        assert!(validate_target_triple("x86_64-unknown-linux-gnu").is_ok());
    }

    #[test]
    fn validate_target_triple_rejects_shell_metacharacters() {
        assert!(validate_target_triple("x86_64; rm -rf /").is_err());
    }

    #[test]
    fn validate_feature_name_accepts_slash_and_dash() {
        assert!(validate_feature_name("serde/derive").is_ok());
        assert!(validate_feature_name("pcre2-lite").is_ok());
    }

    #[test]
    fn validate_feature_name_rejects_whitespace() {
        assert!(validate_feature_name("foo bar").is_err());
    }
}
