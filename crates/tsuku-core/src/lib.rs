//! Core engine for the tsuku tool installer.
//!
//! This crate provides the foundational logic for turning a declarative
//! recipe into a deterministic install Plan and executing that Plan into
//! a content-addressed `tools/{name}-{version}/` layout. It is designed to
//! be consumed by higher-level CLI frontends without coupling to any
//! specific UI.

/// Action implementations (C8/C9/C10): primitives, composites, ecosystem builders.
pub mod actions;
/// `ExecutionContext` and `EvalContext` (spec.md §3).
pub mod context;
/// Unified error taxonomy for the installation engine.
pub mod error;
/// Execution engine (C11): runs a Plan's Steps, promotes the result atomically.
pub mod executor;
/// I/O utilities for downloading, extracting, and verifying artifacts.
pub mod io;
/// Filesystem path helpers for the tsuku directory layout.
pub mod paths;
/// Plan and Step data model (spec.md §3).
pub mod plan;
/// Declarative, caller-supplied recipe parsing.
pub mod recipe;
/// Binary format detector + relocator (C6).
pub mod relocate;
/// Action registry & traits (C7).
pub mod registry;

/// Progress reporting trait and implementations for UI decoupling.
pub mod reporter;

pub use error::CoreError;
pub use executor::{Executor, ExecutorConfig};
pub use paths::*;
pub use plan::{Plan, Step};
pub use recipe::Recipe;
pub use reporter::{NullReporter, Reporter, TracingReporter};

/// User Agent string for core operations.
pub const USER_AGENT: &str = concat!("tsuku-core/", env!("CARGO_PKG_VERSION"));
