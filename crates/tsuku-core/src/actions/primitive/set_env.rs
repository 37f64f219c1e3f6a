//! `set_env` primitive (spec.md §4.8): writes `install_dir/env.sh`.

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::paths::expand;
use crate::registry::{Action, Primitive};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Deserialize)]
struct EnvVar {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct Params {
    vars: Vec<EnvVar>,
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

pub struct SetEnv;

impl Action for SetEnv {
    fn name(&self) -> &'static str {
        "set_env"
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

#[async_trait]
impl Primitive for SetEnv {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: Params = params::decode(raw_params)?;

        let vars: HashMap<String, String> = [
            (
                "install_dir".to_string(),
                ctx.install_dir.display().to_string(),
            ),
            ("work_dir".to_string(), ctx.work_dir.display().to_string()),
            ("version".to_string(), ctx.version.as_str().to_string()),
        ]
        .into_iter()
        .collect();

        let mut script = String::new();
        for var in &p.vars {
            let expanded = expand(&var.value, &vars);
            script.push_str(&format!("export {}={}\n", var.name, shell_quote(&expanded)));
        }

        tokio::fs::create_dir_all(&ctx.install_dir).await?;
        tokio::fs::write(ctx.install_dir.join("env.sh"), script).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("a'b"), r"'a'\''b'");
    }
}
