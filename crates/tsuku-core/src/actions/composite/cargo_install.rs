//! `cargo_install` composite (spec.md §4.9/§4.10): captures a `Cargo.lock`
//! at plan time so `cargo_build` can fetch the real crates.io tarball and
//! build fully offline against it.

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
struct LockFile {
    package: Vec<LockPackage>,
}

#[derive(Debug, Deserialize)]
struct LockPackage {
    name: String,
    version: String,
    #[serde(default)]
    checksum: Option<String>,
}

/// Extracts the registry checksum (sha256 of the packed `.crate` tarball)
/// that `cargo generate-lockfile` recorded for `crate_name`/`version`.
fn tarball_checksum(lock_data: &str, crate_name: &str, version: &str) -> Result<String, CoreError> {
    let lock: LockFile = toml::from_str(lock_data)
        .map_err(|e| CoreError::BadParam(format!("could not parse Cargo.lock: {e}")))?;
    lock.package
        .into_iter()
        .find(|pkg| pkg.name == crate_name && pkg.version == version)
        .and_then(|pkg| pkg.checksum)
        .ok_or_else(|| {
            CoreError::BadParam(format!(
                "Cargo.lock has no checksum for {crate_name} {version}"
            ))
        })
}

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(rename = "crate")]
    crate_name: String,
    #[serde(default)]
    bins: Vec<String>,
    #[serde(default)]
    features: Vec<String>,
}

pub struct CargoInstall;

impl Action for CargoInstall {
    fn name(&self) -> &'static str {
        "cargo_install"
    }

    fn requires_network(&self) -> bool {
        true
    }
}

fn cargo_toml_contents(crate_name: &str, version: &str, features: &[String]) -> String {
    let mut manifest = format!(
        "[package]\nname = \"tsuku-cargo-scratch\"\nversion = \"0.0.0\"\nedition = \"2021\"\n\n[dependencies]\n"
    );
    if features.is_empty() {
        manifest.push_str(&format!("{crate_name} = \"={version}\"\n"));
    } else {
        let feature_list = features
            .iter()
            .map(|f| format!("\"{f}\""))
            .collect::<Vec<_>>()
            .join(", ");
        manifest.push_str(&format!(
            "{crate_name} = {{ version = \"={version}\", features = [{feature_list}] }}\n"
        ));
    }
    manifest
}

#[async_trait]
impl Composite for CargoInstall {
    async fn decompose(
        &self,
        eval_ctx: &EvalContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Vec<Step>, CoreError> {
        let p: Params = params::decode(raw_params)?;
        let version = eval_ctx.version.as_str();

        let scratch = tempfile::tempdir()?;
        tokio::fs::write(
            scratch.path().join("Cargo.toml"),
            cargo_toml_contents(&p.crate_name, version, &p.features),
        )
        .await?;
        tokio::fs::create_dir_all(scratch.path().join("src")).await?;
        tokio::fs::write(scratch.path().join("src/main.rs"), "fn main() {}\n").await?;

        let output = Command::new("cargo")
            .args(["generate-lockfile"])
            .current_dir(scratch.path())
            .output()
            .await?;
        if !output.status.success() {
            return Err(CoreError::SubprocessFailed {
                command: "cargo generate-lockfile".to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let lock_data = tokio::fs::read_to_string(scratch.path().join("Cargo.lock")).await?;
        let checksum = tarball_checksum(&lock_data, &p.crate_name, version)?;

        Ok(vec![Step::new("cargo_build")
            .with_param("crate", p.crate_name)
            .with_param("version", version.to_string())
            .with_param("bins", p.bins)
            .with_param("features", p.features)
            .with_param("lock_data", lock_data)
            .with_param("checksum", checksum)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cargo_toml_pins_exact_version_without_features() {
        let manifest = cargo_toml_contents("ripgrep", "14.1.0", &[]);
        assert!(manifest.contains("ripgrep = \"=14.1.0\""));
    }

    #[test]
    fn cargo_toml_includes_feature_list() {
        let manifest = cargo_toml_contents("ripgrep", "14.1.0", &["pcre2".to_string()]);
        assert!(manifest.contains("features = [\"pcre2\"]"));
    }

    #[test]
    fn tarball_checksum_finds_matching_package() {
        let lock = r#"
version = 3

[[package]]
name = "ripgrep"
version = "14.1.0"
source = "registry+https://github.com/rust-lang/crates.io-index"
checksum = "abc123"

[[package]]
name = "other"
version = "1.0.0"
source = "registry+https://github.com/rust-lang/crates.io-index"
checksum = "def456"
"#;
        assert_eq!(
            tarball_checksum(lock, "ripgrep", "14.1.0").unwrap(),
            "abc123"
        );
    }

    #[test]
    fn tarball_checksum_errors_when_missing() {
        let lock = r#"
version = 3

[[package]]
name = "ripgrep"
version = "14.1.0"
source = "registry+https://github.com/rust-lang/crates.io-index"
checksum = "abc123"
"#;
        assert!(tarball_checksum(lock, "ripgrep", "14.2.0").is_err());
    }
}
