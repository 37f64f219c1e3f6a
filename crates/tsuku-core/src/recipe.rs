//! Recipe: the declarative, caller-supplied description of how to install
//! one tool (spec.md §3). The core treats it as opaque structured input;
//! parsing from TOML is provided here only because the teacher's own
//! `package.rs` blurs the same line, not because recipe authoring is the
//! core's job.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tsuku_schema::ToolName;

/// One `{action, params}` entry in a recipe's install sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallStep {
    pub action: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

/// A declared dependency, scoped to when it's needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default)]
    pub version_req: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dependencies {
    #[serde(default)]
    pub install_time: Vec<Dependency>,
    #[serde(default)]
    pub runtime: Vec<Dependency>,
}

/// A recipe: tool name, recognised version tags, an install sequence, an
/// optional post-install verification command, and declared dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    #[serde(default)]
    pub recognised_versions: Vec<String>,
    pub install: Vec<InstallStep>,
    #[serde(default)]
    pub verify: Option<String>,
    #[serde(default)]
    pub dependencies: Dependencies,
}

impl Recipe {
    /// Parse a recipe from its TOML representation.
    ///
    /// # Errors
    ///
    /// Returns a `toml::de::Error` if the document doesn't match the
    /// `Recipe` shape.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn tool_name(&self) -> ToolName {
        ToolName::new(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE_RECIPE: &str = r#"
        name = "kubectl"
        recognised_versions = ["1.29.3"]
        verify = "kubectl version --client"

        [[install]]
        action = "github_archive"
        [install.params]
        repo = "kubernetes/kubernetes"
        tag_prefix = "v"
    "#;

    #[test]
    fn parses_minimal_recipe() {
        let recipe = Recipe::from_toml(EXAMPLE_RECIPE).unwrap();
        assert_eq!(recipe.name, "kubectl");
        assert_eq!(recipe.install.len(), 1);
        assert_eq!(recipe.install[0].action, "github_archive");
        assert_eq!(recipe.verify.as_deref(), Some("kubectl version --client"));
    }

    #[test]
    fn tool_name_is_lowercased() {
        let mut recipe = Recipe::from_toml(EXAMPLE_RECIPE).unwrap();
        recipe.name = "KubeCtl".to_string();
        assert_eq!(recipe.tool_name().as_str(), "kubectl");
    }
}
