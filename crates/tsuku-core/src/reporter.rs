//! Reporter trait for dependency injection
//!
//! This trait allows core logic to report progress and status without
//! being coupled to a specific TUI or GUI implementation. Narrowed from a
//! multi-package batch pipeline to a single Plan's progress, since a Plan
//! always installs exactly one tool at one version.

use tsuku_schema::{ResolvedVersion, ToolName};

pub trait Reporter: Send + Sync {
    /// Indicates a new section or phase has started (e.g. "Planning", "Executing").
    fn section(&self, title: &str);

    /// Marks an install as successfully completed.
    fn done(&self, name: &ToolName, version: &ResolvedVersion, detail: &str, size: Option<u64>);

    /// Marks an install as failed with a specific reason.
    fn failed(&self, name: &ToolName, version: &ResolvedVersion, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title)
    }
    fn done(&self, name: &ToolName, version: &ResolvedVersion, detail: &str, size: Option<u64>) {
        (**self).done(name, version, detail, size)
    }
    fn failed(&self, name: &ToolName, version: &ResolvedVersion, reason: &str) {
        (**self).failed(name, version, reason)
    }
    fn info(&self, msg: &str) {
        (**self).info(msg)
    }
    fn success(&self, msg: &str) {
        (**self).success(msg)
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg)
    }
    fn error(&self, msg: &str) {
        (**self).error(msg)
    }
}

/// A no-op reporter for silent operations (e.g., verification, testing).
#[derive(Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn done(&self, _: &ToolName, _: &ResolvedVersion, _: &str, _: Option<u64>) {}
    fn failed(&self, _: &ToolName, _: &ResolvedVersion, _: &str) {}
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
}

/// Default reporter: forwards every event to `tracing`, for CLI frontends
/// that install their own subscriber rather than rolling a TUI.
#[derive(Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn section(&self, title: &str) {
        tracing::info!(section = title, "entering section");
    }

    fn done(&self, name: &ToolName, version: &ResolvedVersion, detail: &str, size: Option<u64>) {
        tracing::info!(tool = %name, version = %version.canonical, detail, size = ?size, "install complete");
    }

    fn failed(&self, name: &ToolName, version: &ResolvedVersion, reason: &str) {
        tracing::error!(tool = %name, version = %version.canonical, reason, "install failed");
    }

    fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    fn success(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    fn warning(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }
}
