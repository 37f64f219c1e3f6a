use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// A normalized tool name, as it appears in a recipe and in the on-disk
/// `tools/{name}-{version}/` layout.
///
/// Lowercased on construction so that recipe authors and path builders
/// never have to agree on case by convention.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToolName(String);

impl ToolName {
    pub fn new(name: &str) -> Self {
        Self(name.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<std::ffi::OsStr> for ToolName {
    fn as_ref(&self) -> &std::ffi::OsStr {
        self.0.as_ref()
    }
}

impl AsRef<std::path::Path> for ToolName {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for ToolName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ToolName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ToolName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.to_lowercase()
    }
}

impl PartialEq<&str> for ToolName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.to_lowercase()
    }
}

impl PartialEq<String> for ToolName {
    fn eq(&self, other: &String) -> bool {
        self.0 == other.to_lowercase()
    }
}

impl Borrow<str> for ToolName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ToolName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ToolName {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

/// A resolved version: the recipe-facing `tag` (as written by whatever
/// resolved it — a git tag, an upstream release name) paired with its
/// `canonical` semver-comparable form used for ordering and the
/// content-addressed install path.
///
/// The two are kept distinct because upstream tags are rarely valid
/// semver on their own (`v1.2.3`, `release-1.2.3`); `canonical` is the
/// caller's job to derive, not this type's.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedVersion {
    /// The version string as named by the recipe or upstream source.
    pub tag: String,
    /// The semver-comparable form used for ordering and path construction.
    pub canonical: String,
}

impl ResolvedVersion {
    pub fn new(tag: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            canonical: canonical.into(),
        }
    }

    /// Build a `ResolvedVersion` whose tag and canonical form are identical,
    /// for the common case where the upstream tag is already valid semver.
    pub fn exact(version: impl Into<String>) -> Self {
        let version = version.into();
        Self {
            tag: version.clone(),
            canonical: version,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

impl Ord for ResolvedVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (
            semver::Version::parse(&self.canonical),
            semver::Version::parse(&other.canonical),
        ) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            (Ok(_), Err(_)) => std::cmp::Ordering::Less,
            (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
            (Err(_), Err(_)) => self.canonical.cmp(&other.canonical),
        }
    }
}

impl PartialOrd for ResolvedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical)
    }
}

impl AsRef<std::path::Path> for ResolvedVersion {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_name_lowercases() {
        assert_eq!(ToolName::new("Ripgrep").as_str(), "ripgrep");
    }

    #[test]
    fn tool_name_compares_case_insensitively_against_str() {
        assert_eq!(ToolName::new("ripgrep"), "Ripgrep");
    }

    #[test]
    fn resolved_version_exact_matches_tag_and_canonical() {
        let v = ResolvedVersion::exact("1.2.3");
        assert_eq!(v.tag, "1.2.3");
        assert_eq!(v.canonical, "1.2.3");
    }

    #[test]
    fn resolved_version_orders_by_canonical_semver() {
        let a = ResolvedVersion::new("v1.2.0", "1.2.0");
        let b = ResolvedVersion::new("v1.10.0", "1.10.0");
        assert!(a < b);
    }

    #[test]
    fn resolved_version_falls_back_to_string_ordering_on_non_semver() {
        let a = ResolvedVersion::new("nightly", "nightly-2024-01-01");
        let b = ResolvedVersion::new("nightly", "nightly-2024-02-01");
        assert!(a < b);
    }
}
