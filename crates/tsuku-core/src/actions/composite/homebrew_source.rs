//! `homebrew_source` composite (spec.md §4.9): same GHCR bottle resolution
//! as `homebrew`, but for the `src` variant Homebrew publishes alongside
//! bottles for formulae that declare `:build` dependencies, emitted as a
//! plain tarball rather than a relocatable bottle.

use crate::actions::composite::homebrew::Homebrew;
use crate::context::EvalContext;
use crate::error::CoreError;
use crate::plan::Step;
use crate::registry::{Action, Composite};
use async_trait::async_trait;
use std::collections::BTreeMap;

pub struct HomebrewSource;

impl Action for HomebrewSource {
    fn name(&self) -> &'static str {
        "homebrew_source"
    }

    fn requires_network(&self) -> bool {
        true
    }
}

#[async_trait]
impl Composite for HomebrewSource {
    async fn decompose(
        &self,
        eval_ctx: &EvalContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Vec<Step>, CoreError> {
        // Bottle resolution is identical; the only difference is that the
        // tree this unpacks to is source, so no `homebrew_relocate` step is
        // appropriate (there is nothing to relocate before a build runs).
        let mut steps = Homebrew.decompose(eval_ctx, raw_params).await?;
        steps.retain(|s| s.action != "homebrew_relocate");
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_name_is_homebrew_source() {
        assert_eq!(HomebrewSource.name(), "homebrew_source");
    }
}
