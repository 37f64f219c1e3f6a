//! `ExecutionContext` and `EvalContext` (spec.md §3).
//!
//! `ExecutionContext` is the single value threaded through every
//! primitive's `execute`. Its `env` field is owned mutably by the executor
//! and extended only by `setup_build_env`, per the redesign note on
//! execution-context ownership.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tsuku_schema::{Platform, ResolvedVersion, ToolName};

/// Cooperative cancellation shared by every blocking point in an install.
pub type CancelToken = CancellationToken;

/// Per-install value threaded through every primitive.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub cancel: CancelToken,

    /// Scratch directory, deleted on completion.
    pub work_dir: PathBuf,
    /// Staging root; atomically renamed to `tool_install_dir` on success.
    pub install_dir: PathBuf,
    /// Final content-addressed root this install will be promoted to.
    pub tool_install_dir: PathBuf,

    /// Siblings reachable for dependency lookup.
    pub tools_dir: PathBuf,
    pub libs_dir: PathBuf,

    pub download_cache_dir: PathBuf,
    pub key_cache_dir: PathBuf,

    pub tool_name: ToolName,
    pub version: ResolvedVersion,
    pub platform: Platform,

    /// Prepended to PATH when running external tools.
    pub exec_paths: Vec<PathBuf>,

    /// Resolved install-time/runtime dependencies, name -> version.
    pub dependencies: HashMap<ToolName, ResolvedVersion>,

    /// Shared environment built up by `setup_build_env`. Every other
    /// primitive only reads it.
    pub env: Arc<HashMap<String, String>>,

    /// Whether the recipe declares a post-install `verify` command. Carried
    /// here (rather than threaded through `Step::params`) so `install_binaries`
    /// can enforce spec.md §4.8's "Directory mode requires a verify command"
    /// rule without a dedicated planner pass.
    pub verify_declared: bool,
}

impl ExecutionContext {
    /// Invariant check: `work_dir != install_dir` and both are absolute.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if the invariant does not hold;
    /// callers are expected to treat this as a programmer error (`expect`
    /// at construction sites), not a recoverable runtime condition.
    pub fn validate_invariants(&self) -> Result<(), String> {
        if self.work_dir == self.install_dir {
            return Err("work_dir must differ from install_dir".to_string());
        }
        if !self.work_dir.is_absolute() {
            return Err("work_dir must be absolute".to_string());
        }
        if !self.install_dir.is_absolute() {
            return Err("install_dir must be absolute".to_string());
        }
        Ok(())
    }

    /// PATH value for subprocess invocations: `exec_paths` prepended to the
    /// inherited PATH.
    pub fn build_path_env(&self) -> std::ffi::OsString {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let mut parts: Vec<std::path::PathBuf> = self.exec_paths.clone();
        parts.extend(std::env::split_paths(&inherited));
        std::env::join_paths(parts).unwrap_or(inherited)
    }
}

/// Planning-time counterpart of `ExecutionContext`.
///
/// Composites may use the optional downloader+cache pair during
/// decomposition to sample an archive's checksum/size.
#[derive(Clone)]
pub struct EvalContext {
    pub cancel: CancelToken,
    pub platform: Platform,
    pub version: ResolvedVersion,
    pub http: Option<reqwest::Client>,
    pub download_cache_dir: Option<PathBuf>,
}

impl std::fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalContext")
            .field("platform", &self.platform)
            .field("version", &self.version)
            .field("has_http", &self.http.is_some())
            .field("download_cache_dir", &self.download_cache_dir)
            .finish()
    }
}
