//! Plan and Step data model (spec.md §3).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tsuku_schema::{Platform, ResolvedVersion};

/// The atomic unit of a Plan. After decomposition, `params` contains no
/// composite-only keys — only what the named primitive actually consumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Step {
    pub action: String,
    /// `BTreeMap` (not `HashMap`) so that JSON serialisation for plan
    /// determinism tests is key-order stable.
    pub params: BTreeMap<String, serde_json::Value>,
    pub checksum: Option<String>,
    pub size: Option<u64>,
}

impl Step {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: BTreeMap::new(),
            checksum: None,
            size: None,
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// Ordered sequence of Steps plus plan-level metadata.
///
/// Deterministic with respect to `(recipe, resolved_version, os, arch)` for
/// deterministic actions; composites that fetch registry data at plan time
/// freeze their result into the plan (e.g. a pinned checksum or captured
/// lockfile), so re-planning against fixture-backed upstream responses
/// reproduces the same Steps byte for byte.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plan {
    pub tool: String,
    pub version: ResolvedVersionRecord,
    pub target: Platform,
    pub steps: Vec<Step>,
}

/// `ResolvedVersion` mirrored here with derived `Eq`/serde so a `Plan` can
/// be compared and serialised wholesale for the determinism test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedVersionRecord {
    pub tag: String,
    pub canonical: String,
}

impl From<&ResolvedVersion> for ResolvedVersionRecord {
    fn from(v: &ResolvedVersion) -> Self {
        Self {
            tag: v.tag.clone(),
            canonical: v.canonical.clone(),
        }
    }
}

impl Plan {
    pub fn new(tool: impl Into<String>, version: &ResolvedVersion, target: Platform) -> Self {
        Self {
            tool: tool.into(),
            version: version.into(),
            target,
            steps: Vec::new(),
        }
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Canonical JSON for determinism comparisons and fixture snapshots.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` only if a `Step`'s params somehow
    /// contain a non-serialisable value, which cannot happen for
    /// `serde_json::Value`.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsuku_schema::{Arch, Os};

    #[test]
    fn plan_determinism_same_inputs_same_json() {
        let version = ResolvedVersion::exact("1.29.3");
        let target = Platform {
            os: Os::Linux,
            arch: Arch::X86_64,
        };

        let make = || {
            let mut p = Plan::new("kubectl", &version, target);
            p.push(
                Step::new("download_file")
                    .with_param("url", "https://example.com/kubectl-1.29.3.tar.gz")
                    .with_checksum("a".repeat(64)),
            );
            p.push(Step::new("extract").with_param("strip_dirs", 1));
            p
        };

        assert_eq!(
            make().to_canonical_json().unwrap(),
            make().to_canonical_json().unwrap()
        );
    }
}
