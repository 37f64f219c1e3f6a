//! `gem_install` composite (spec.md §4.9): captures a `Gemfile.lock` at plan
//! time so `gem_exec` can install fully offline.

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
    gem: String,
    #[serde(default)]
    executables: Vec<String>,
}

pub struct GemInstall;

impl Action for GemInstall {
    fn name(&self) -> &'static str {
        "gem_install"
    }

    fn requires_network(&self) -> bool {
        true
    }
}

fn gemfile_contents(gem: &str, version: &str) -> String {
    format!("source \"https://rubygems.org\"\ngem \"{gem}\", \"{version}\"\n")
}

#[async_trait]
impl Composite for GemInstall {
    async fn decompose(
        &self,
        eval_ctx: &EvalContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Vec<Step>, CoreError> {
        let p: Params = params::decode(raw_params)?;
        let version = eval_ctx.version.as_str();

        let scratch = tempfile::tempdir()?;
        tokio::fs::write(
            scratch.path().join("Gemfile"),
            gemfile_contents(&p.gem, version),
        )
        .await?;

        let output = Command::new("bundle")
            .args(["lock", "--add-checksums"])
            .current_dir(scratch.path())
            .output()
            .await?;
        if !output.status.success() {
            return Err(CoreError::SubprocessFailed {
                command: "bundle lock --add-checksums".to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let lock_data = tokio::fs::read_to_string(scratch.path().join("Gemfile.lock")).await?;

        let executables = if p.executables.is_empty() {
            vec![p.gem.clone()]
        } else {
            p.executables
        };

        Ok(vec![Step::new("gem_exec")
            .with_param("gem", p.gem)
            .with_param("version", version.to_string())
            .with_param("executables", executables)
            .with_param("lock_data", lock_data)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemfile_contents_pins_exact_version() {
        let contents = gemfile_contents("rails", "7.1.0");
        assert!(contents.contains("gem \"rails\", \"7.1.0\""));
    }
}
