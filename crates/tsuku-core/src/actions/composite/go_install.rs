//! `go_install` composite (spec.md §4.9/§4.10): writes a minimal module and
//! captures `go.sum` so the execution-time build is reproducible offline.

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
    module: String,
}

pub struct GoInstall;

impl Action for GoInstall {
    fn name(&self) -> &'static str {
        "go_install"
    }

    fn requires_network(&self) -> bool {
        true
    }
}

fn go_mod_contents(module: &str) -> String {
    format!("module tsuku-scratch\n\ngo 1.22\n\nrequire {module} v0.0.0\n")
}

#[async_trait]
impl Composite for GoInstall {
    async fn decompose(
        &self,
        eval_ctx: &EvalContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Vec<Step>, CoreError> {
        let p: Params = params::decode(raw_params)?;
        let version = eval_ctx.version.as_str();

        let scratch = tempfile::tempdir()?;
        tokio::fs::write(scratch.path().join("go.mod"), go_mod_contents(&p.module)).await?;

        let output = Command::new("go")
            .args(["mod", "download"])
            .current_dir(scratch.path())
            .output()
            .await?;
        if !output.status.success() {
            return Err(CoreError::SubprocessFailed {
                command: "go mod download".to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let go_sum = match tokio::fs::read_to_string(scratch.path().join("go.sum")).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(CoreError::Io(e)),
        };

        Ok(vec![Step::new("go_build")
            .with_param("module", p.module)
            .with_param("version", version.to_string())
            .with_param("go_sum", go_sum)])
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
