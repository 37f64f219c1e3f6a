//! Action registry & traits (C7).
//!
//! The teacher has no registry-of-trait-objects (its actions are free
//! functions); this is built directly from spec.md §9's redesign note:
//! two disjoint traits (`Primitive`, `Composite`), an `ActionKind` enum,
//! and an exhaustive-by-construction classification invariant.

use crate::context::{EvalContext, ExecutionContext};
use crate::error::CoreError;
use crate::plan::Step;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Declared install-time/runtime/eval-time dependency set for an action,
/// optionally narrowed per OS family.
#[derive(Debug, Clone, Default)]
pub struct ActionDependencies {
    pub install_time: Vec<String>,
    pub runtime: Vec<String>,
    pub eval_time: Vec<String>,
    pub linux_only: Vec<String>,
    pub darwin_only: Vec<String>,
}

/// Preflight validation result: pure, no I/O.
#[derive(Debug, Clone, Default)]
pub struct PreflightResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl PreflightResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Every action, primitive or composite, implements this base trait.
pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_deterministic(&self) -> bool {
        false
    }

    fn requires_network(&self) -> bool {
        false
    }

    fn dependencies(&self) -> ActionDependencies {
        ActionDependencies::default()
    }
}

/// A leaf action: performs I/O or computation but never expands into
/// smaller actions.
#[async_trait]
pub trait Primitive: Action {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError>;
}

/// An action that expands into a sequence of primitive Steps at planning
/// time.
#[async_trait]
pub trait Composite: Action {
    async fn decompose(
        &self,
        eval_ctx: &EvalContext,
        params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Vec<Step>, CoreError>;
}

/// Pure validation, independent of execution.
pub trait Preflight {
    fn preflight(&self, params: &BTreeMap<String, serde_json::Value>) -> PreflightResult;
}

/// Actions that only describe a command a human must run (`apt_install`,
/// `brew_install`, …) implement this instead of actually executing it.
pub trait Describe {
    fn describe(&self, params: &BTreeMap<String, serde_json::Value>) -> String;
}

/// Refines `requires_network` per invocation rather than as a blanket
/// constant (e.g. `download` only needs the network if its cache entry is
/// absent).
pub trait NetworkValidator {
    fn requires_network_for(&self, params: &BTreeMap<String, serde_json::Value>) -> bool;
}

/// Restricts an action to a platform family, e.g. `apt_*` to Linux/Debian.
pub trait ImplicitConstraint {
    fn allowed_on(&self, os: tsuku_schema::Os) -> bool;
}

/// True for actions that delegate to the host package manager rather than
/// performing the install themselves.
pub trait IsExternallyManaged {
    fn is_externally_managed(&self) -> bool {
        true
    }
}

/// A registered action, holding whichever of the two disjoint kinds it is.
/// `IsPrimitive`/`IsDecomposable` below are exhaustive matches over this
/// enum, so the classification invariant holds by construction rather than
/// by convention.
pub enum ActionKind {
    Primitive(Arc<dyn Primitive>),
    Composite(Arc<dyn Composite>),
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Primitive(p) => p.name(),
            ActionKind::Composite(c) => c.name(),
        }
    }
}

/// Process-wide, read-mostly name -> action lookup. Registration happens
/// once at startup before any install begins, after which the registry is
/// treated as immutable and is safe to read concurrently.
#[derive(Default)]
pub struct Registry {
    actions: HashMap<&'static str, ActionKind>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: ActionKind) {
        self.actions.insert(kind.name(), kind);
    }

    pub fn get(&self, name: &str) -> Option<&ActionKind> {
        self.actions.get(name)
    }

    /// An action is primitive iff it is registered and holds the
    /// `Primitive` variant.
    pub fn is_primitive(&self, name: &str) -> bool {
        matches!(self.actions.get(name), Some(ActionKind::Primitive(_)))
    }

    /// An action is decomposable iff it is registered and holds the
    /// `Composite` variant. Disjoint with `is_primitive` by construction:
    /// every registered name maps to exactly one `ActionKind` variant.
    pub fn is_decomposable(&self, name: &str) -> bool {
        matches!(self.actions.get(name), Some(ActionKind::Composite(_)))
    }

    /// Freezes the registry into a shareable, immutable handle.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DummyPrimitive;
    impl Action for DummyPrimitive {
        fn name(&self) -> &'static str {
            "dummy_primitive"
        }
    }
    #[async_trait]
    impl Primitive for DummyPrimitive {
        async fn execute(
            &self,
            _ctx: &ExecutionContext,
            _params: &BTreeMap<String, serde_json::Value>,
        ) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct DummyComposite;
    impl Action for DummyComposite {
        fn name(&self) -> &'static str {
            "dummy_composite"
        }
    }
    #[async_trait]
    impl Composite for DummyComposite {
        async fn decompose(
            &self,
            _eval_ctx: &EvalContext,
            _params: &BTreeMap<String, serde_json::Value>,
        ) -> Result<Vec<Step>, CoreError> {
            Ok(vec![])
        }
    }

    #[test]
    fn classification_is_disjoint_and_exhaustive() {
        let mut registry = Registry::new();
        registry.register(ActionKind::Primitive(Arc::new(DummyPrimitive)));
        registry.register(ActionKind::Composite(Arc::new(DummyComposite)));

        for name in ["dummy_primitive", "dummy_composite"] {
            assert_ne!(registry.is_primitive(name), registry.is_decomposable(name));
        }
    }

    #[test]
    fn unregistered_name_is_neither() {
        let registry = Registry::new();
        assert!(!registry.is_primitive("nope"));
        assert!(!registry.is_decomposable("nope"));
    }
}
