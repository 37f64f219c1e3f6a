//! Execution engine (C11): runs a `Plan`'s Steps against a registry,
//! promoting the staged install atomically on success.
//!
//! Grounded on the teacher's `builder.rs` orchestration shape (prepare a
//! scratch root, run the work, move the result into place) generalised from
//! a single hermetic build script to an ordered Step sequence per
//! spec.md §4.11.

use crate::context::{CancelToken, ExecutionContext};
use crate::error::CoreError;
use crate::paths;
use crate::plan::Plan;
use crate::registry::{ActionKind, Registry};
use crate::reporter::{NullReporter, Reporter};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tsuku_schema::{Platform, ResolvedVersion, ToolName};

/// Inputs an `Executor` needs beyond the `Plan` itself: everything that
/// varies per host and per install but isn't baked into the plan.
pub struct ExecutorConfig {
    pub tsuku_home: PathBuf,
    pub dependencies: HashMap<ToolName, ResolvedVersion>,
    pub exec_paths: Vec<PathBuf>,
    pub cancel: CancelToken,
}

impl ExecutorConfig {
    pub fn new(tsuku_home: PathBuf) -> Self {
        Self {
            tsuku_home,
            dependencies: HashMap::new(),
            exec_paths: Vec::new(),
            cancel: CancelToken::new(),
        }
    }
}

pub struct Executor {
    registry: Arc<Registry>,
    reporter: Arc<dyn Reporter>,
}

impl Executor {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            reporter: Arc::new(NullReporter),
        }
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Runs every Step in `plan` in order, then the recipe's `verify`
    /// command if present, then atomically promotes the staging directory.
    ///
    /// On any fatal error the staging and work directories are removed and
    /// `tools_dir` is left untouched — per spec.md §4.11's atomicity
    /// guarantee.
    ///
    /// # Errors
    ///
    /// Propagates whatever a Step's primitive returns, `CoreError::Cancelled`
    /// if the token fires mid-plan, and `CoreError::VerifyFailed` if the
    /// post-install verify command exits non-zero.
    pub async fn execute(
        &self,
        tool_name: &ToolName,
        platform: Platform,
        plan: &Plan,
        verify: Option<&str>,
        config: ExecutorConfig,
    ) -> Result<PathBuf, CoreError> {
        let version = ResolvedVersion {
            tag: plan.version.tag.clone(),
            canonical: plan.version.canonical.clone(),
        };

        let tools_dir = config.tsuku_home.join("tools");
        let libs_dir = config.tsuku_home.join("libs");
        let download_cache_dir = config.tsuku_home.join("cache").join("downloads");
        let key_cache_dir = config.tsuku_home.join("cache").join("keys");
        let staging_root = tools_dir.join(".install");
        tokio::fs::create_dir_all(&staging_root).await?;
        tokio::fs::create_dir_all(&libs_dir).await?;
        tokio::fs::create_dir_all(&download_cache_dir).await?;
        tokio::fs::create_dir_all(&key_cache_dir).await?;

        let install_id = format!("{}-{}-{}", tool_name.as_str(), version.canonical, std::process::id());
        let work_dir = staging_root.join(format!("{install_id}.work"));
        let install_dir = staging_root.join(format!("{install_id}.staged"));
        tokio::fs::create_dir_all(&work_dir).await?;
        tokio::fs::create_dir_all(&install_dir).await?;

        let tool_install_dir = tools_dir.join(format!("{}-{}", tool_name.as_str(), version.canonical));

        let mut ctx = ExecutionContext {
            cancel: config.cancel.clone(),
            work_dir: work_dir.clone(),
            install_dir: install_dir.clone(),
            tool_install_dir: tool_install_dir.clone(),
            tools_dir,
            libs_dir,
            download_cache_dir,
            key_cache_dir,
            tool_name: tool_name.clone(),
            version,
            platform,
            exec_paths: config.exec_paths,
            dependencies: config.dependencies,
            env: Arc::new(HashMap::new()),
            verify_declared: verify.is_some(),
        };
        ctx.validate_invariants()
            .map_err(|e| CoreError::BadParam(format!("invalid execution context: {e}")))?;

        let result = self.run_steps(&mut ctx, plan).await;
        if let Err(e) = result {
            self.cleanup(&work_dir, &install_dir).await;
            self.reporter.failed(tool_name, &ctx.version, &e.to_string());
            return Err(e);
        }

        if let Some(command) = verify {
            if let Err(e) = self.run_verify(&ctx, command).await {
                self.cleanup(&work_dir, &install_dir).await;
                self.reporter.failed(tool_name, &ctx.version, &e.to_string());
                return Err(e);
            }
        }

        if let Some(parent) = tool_install_dir.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if tokio::fs::metadata(&tool_install_dir).await.is_ok() {
            tokio::fs::remove_dir_all(&tool_install_dir).await?;
        }
        tokio::fs::rename(&install_dir, &tool_install_dir).await?;
        tokio::fs::remove_dir_all(&work_dir).await.ok();

        self.reporter.done(tool_name, &ctx.version, "installed", None);
        Ok(tool_install_dir)
    }

    async fn run_steps(&self, ctx: &mut ExecutionContext, plan: &Plan) -> Result<(), CoreError> {
        for step in &plan.steps {
            if ctx.cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let action = self
                .registry
                .get(&step.action)
                .ok_or_else(|| CoreError::UnknownAction(step.action.clone()))?;

            let primitive = match action {
                ActionKind::Primitive(p) => p,
                ActionKind::Composite(_) => {
                    return Err(CoreError::UnknownAction(format!(
                        "{} is a composite action; plans may only contain primitives",
                        step.action
                    )));
                }
            };

            self.reporter.info(&format!("running {}", step.action));
            primitive.execute(ctx, &step.params).await?;
            self.reporter.success(&format!("{} complete", step.action));

            if step.action == "setup_build_env" {
                self.reload_env(ctx).await?;
            }
        }
        Ok(())
    }

    /// `setup_build_env` cannot mutate `ctx.env` through a shared reference
    /// (see its module doc comment); it writes the merged map to
    /// `work_dir/.tsuku-env.json` instead, which this reads back and swaps
    /// into `ctx` before the next Step runs.
    async fn reload_env(&self, ctx: &mut ExecutionContext) -> Result<(), CoreError> {
        let path = ctx.work_dir.join(".tsuku-env.json");
        let bytes = tokio::fs::read(&path).await?;
        let env: HashMap<String, String> = serde_json::from_slice(&bytes)
            .map_err(|e| CoreError::BadParam(format!("malformed build env file: {e}")))?;
        ctx.env = Arc::new(env);
        Ok(())
    }

    async fn run_verify(&self, ctx: &ExecutionContext, command: &str) -> Result<(), CoreError> {
        let mut path_parts = vec![ctx.install_dir.join("bin")];
        path_parts.extend(ctx.exec_paths.clone());
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        path_parts.extend(std::env::split_paths(&inherited));
        let path = std::env::join_paths(path_parts).unwrap_or(inherited);

        let output = tokio::process::Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .current_dir(&ctx.install_dir)
            .env_clear()
            .envs(ctx.env.iter())
            .env("PATH", path)
            .output()
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(CoreError::VerifyFailed(format!(
                "`{command}` exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )))
        }
    }

    async fn cleanup(&self, work_dir: &PathBuf, install_dir: &PathBuf) {
        tokio::fs::remove_dir_all(work_dir).await.ok();
        tokio::fs::remove_dir_all(install_dir).await.ok();
    }
}

/// Convenience constructor matching the CLI's default layout.
pub fn default_tsuku_home() -> PathBuf {
    paths::tsuku_home()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::plan::{ResolvedVersionRecord, Step};
    use crate::registry::{Action, Primitive};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use tsuku_schema::{Arch, Os};

    struct AlwaysOk;
    impl Action for AlwaysOk {
        fn name(&self) -> &'static str {
            "always_ok"
        }
    }
    #[async_trait]
    impl Primitive for AlwaysOk {
        async fn execute(
            &self,
            _ctx: &ExecutionContext,
            _params: &BTreeMap<String, serde_json::Value>,
        ) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn test_plan() -> Plan {
        Plan {
            tool: "demo".to_string(),
            version: ResolvedVersionRecord {
                tag: "1.0.0".to_string(),
                canonical: "1.0.0".to_string(),
            },
            target: Platform {
                os: Os::Linux,
                arch: Arch::X86_64,
            },
            steps: vec![Step::new("always_ok")],
        }
    }

    #[tokio::test]
    async fn promotes_install_on_success() {
        let mut registry = Registry::new();
        registry.register(ActionKind::Primitive(Arc::new(AlwaysOk)));
        let executor = Executor::new(registry.into_shared());

        let tsuku_home = tempfile::tempdir().unwrap();
        let config = ExecutorConfig::new(tsuku_home.path().to_path_buf());
        let tool_name = ToolName::new("demo");
        let plan = test_plan();

        let install_path = executor
            .execute(
                &tool_name,
                Platform {
                    os: Os::Linux,
                    arch: Arch::X86_64,
                },
                &plan,
                None,
                config,
            )
            .await
            .unwrap();

        assert!(tokio::fs::metadata(&install_path).await.is_ok());
        assert_eq!(install_path, tsuku_home.path().join("tools/demo-1.0.0"));
    }

    #[tokio::test]
    async fn unknown_action_fails_without_touching_tools_dir() {
        let registry = Registry::new();
        let executor = Executor::new(registry.into_shared());

        let tsuku_home = tempfile::tempdir().unwrap();
        let config = ExecutorConfig::new(tsuku_home.path().to_path_buf());
        let tool_name = ToolName::new("demo");
        let plan = test_plan();

        let result = executor
            .execute(
                &tool_name,
                Platform {
                    os: Os::Linux,
                    arch: Arch::X86_64,
                },
                &plan,
                None,
                config,
            )
            .await;

        assert!(matches!(result, Err(CoreError::UnknownAction(_))));
        assert!(tokio::fs::metadata(tsuku_home.path().join("tools/demo-1.0.0"))
            .await
            .is_err());
    }
}
