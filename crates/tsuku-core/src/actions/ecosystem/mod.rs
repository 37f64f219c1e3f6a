//! Ecosystem builders (C10): locked, offline-reproducible installs for
//! Cargo, Go, Bundler, pip and npm packages. Primitives in the trait sense
//! (spec.md §9 groups them separately from C8 only for exposition).

pub mod cargo_build;
pub mod gem_exec;
pub mod go_build;
pub mod npm_exec;
pub mod pip_exec;

use crate::registry::{ActionKind, Registry};
use std::sync::Arc;

pub fn register_all(registry: &mut Registry) {
    registry.register(ActionKind::Primitive(Arc::new(cargo_build::CargoBuild)));
    registry.register(ActionKind::Primitive(Arc::new(go_build::GoBuild)));
    registry.register(ActionKind::Primitive(Arc::new(gem_exec::GemExec)));
    registry.register(ActionKind::Primitive(Arc::new(pip_exec::PipExec)));
    registry.register(ActionKind::Primitive(Arc::new(npm_exec::NpmExec)));
}
