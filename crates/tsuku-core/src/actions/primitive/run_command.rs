//! `run_command` primitive (spec.md §4.8): runs an arbitrary command within
//! `work_dir`, honouring the cancellation token per spec.md §5.

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::registry::{Action, Primitive};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct Params {
    command: String,
    #[serde(default)]
    shell: Option<String>,
}

pub struct RunCommand;

impl Action for RunCommand {
    fn name(&self) -> &'static str {
        "run_command"
    }
}

#[async_trait]
impl Primitive for RunCommand {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: Params = params::decode(raw_params)?;
        let shell = p.shell.as_deref().unwrap_or("/bin/sh");

        let mut cmd = tokio::process::Command::new(shell);
        cmd.arg("-c")
            .arg(&p.command)
            .current_dir(&ctx.work_dir)
            .env_clear()
            .envs(ctx.env.iter())
            .env("PATH", ctx.build_path_env())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        let output = tokio::select! {
            result = child.wait_with_output() => result?,
            () = ctx.cancel.cancelled() => {
                return Err(CoreError::Cancelled);
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(CoreError::SubprocessFailed {
                command: format!("{shell} -c {}", p.command),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}
