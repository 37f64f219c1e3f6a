//! Action implementations (C8/C9/C10), grouped by kind.

pub mod composite;
pub mod ecosystem;
/// Typed-params decoding helper shared by every action.
pub mod params;
pub mod primitive;

use crate::registry::{ActionKind, Registry};
use std::sync::Arc;

/// Builds the process-wide registry with every primitive, composite, and
/// ecosystem action registered. Call once at startup; the result is meant
/// to be frozen with `Registry::into_shared`.
pub fn build_registry() -> Registry {
    let mut registry = Registry::new();

    primitive::register_all(&mut registry);
    composite::register_all(&mut registry);
    ecosystem::register_all(&mut registry);

    registry
}

pub fn build_shared_registry() -> Arc<Registry> {
    build_registry().into_shared()
}
