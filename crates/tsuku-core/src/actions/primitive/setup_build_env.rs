//! `setup_build_env` primitive (spec.md §4.8): the sole primitive authorised
//! to extend `ctx.env`, per spec.md §9's execution-context ownership note.

use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::registry::{Action, Primitive};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tsuku_schema::Os;

/// Fixed reproducible-build timestamp (2000-01-01T00:00:00Z), matching the
/// teacher's build pipeline convention.
const SOURCE_DATE_EPOCH: &str = "946684800";

pub struct SetupBuildEnv;

impl Action for SetupBuildEnv {
    fn name(&self) -> &'static str {
        "setup_build_env"
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

#[async_trait]
impl Primitive for SetupBuildEnv {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        _params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let mut env: HashMap<String, String> = (*ctx.env).clone();
        env.insert("SOURCE_DATE_EPOCH".to_string(), SOURCE_DATE_EPOCH.to_string());

        let mut pkg_config_path = Vec::new();
        let mut cppflags = Vec::new();
        let mut ldflags = Vec::new();

        for (name, version) in &ctx.dependencies {
            let dep_root = ctx.tools_dir.join(format!("{name}-{}", version.as_str()));

            let pkgconfig = dep_root.join("lib/pkgconfig");
            if tokio::fs::metadata(&pkgconfig).await.is_ok() {
                pkg_config_path.push(pkgconfig.display().to_string());
            }

            let include = dep_root.join("include");
            if tokio::fs::metadata(&include).await.is_ok() {
                cppflags.push(format!("-I{}", include.display()));
            }

            let lib = dep_root.join("lib");
            if tokio::fs::metadata(&lib).await.is_ok() {
                let mut flag = format!("-L{}", lib.display());
                if ctx.platform.os == Os::Linux {
                    flag.push_str(&format!(" -Wl,-rpath,{}", lib.display()));
                }
                ldflags.push(flag);
            }
        }

        if !pkg_config_path.is_empty() {
            env.insert("PKG_CONFIG_PATH".to_string(), pkg_config_path.join(":"));
        }
        if !cppflags.is_empty() {
            env.insert("CPPFLAGS".to_string(), cppflags.join(" "));
        }
        if !ldflags.is_empty() {
            env.insert("LDFLAGS".to_string(), ldflags.join(" "));
        }

        // `ctx.env` is an `Arc<HashMap<_>>` owned by the executor between
        // steps; `setup_build_env` cannot mutate it through a shared
        // reference, so it writes the merged map to `work_dir/.env.json`
        // for the executor to swap in before the next step.
        let serialized = serde_json::to_vec(&env)
            .map_err(|e| CoreError::BadParam(format!("failed to serialize build env: {e}")))?;
        tokio::fs::write(ctx.work_dir.join(".tsuku-env.json"), serialized).await?;

        Ok(())
    }
}
