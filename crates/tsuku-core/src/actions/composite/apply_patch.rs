//! `apply_patch` composite (spec.md §4.9).

use crate::actions::params;
use crate::context::EvalContext;
use crate::error::CoreError;
use crate::plan::Step;
use crate::registry::{Action, Composite};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Component, Path};

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    subdir: Option<String>,
}

pub struct ApplyPatch;

impl Action for ApplyPatch {
    fn name(&self) -> &'static str {
        "apply_patch"
    }

    fn requires_network(&self) -> bool {
        true
    }
}

fn validate_subdir(subdir: &str) -> Result<(), CoreError> {
    let path = Path::new(subdir);
    if path.is_absolute() || path.components().any(|c| c == Component::ParentDir) {
        return Err(CoreError::BadParam(format!(
            "subdir must be relative and cannot cross the work_dir root: {subdir}"
        )));
    }
    Ok(())
}

#[async_trait]
impl Composite for ApplyPatch {
    async fn decompose(
        &self,
        _eval_ctx: &EvalContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Vec<Step>, CoreError> {
        let p: Params = params::decode(raw_params)?;

        if p.url.is_some() && p.data.is_some() {
            return Err(CoreError::BadParam(
                "apply_patch accepts either url or data, not both".to_string(),
            ));
        }

        if let Some(subdir) = &p.subdir {
            validate_subdir(subdir)?;
        }

        match (p.url, p.data) {
            (Some(url), None) => {
                if !url.starts_with("https://") {
                    return Err(CoreError::InsecureScheme(url));
                }
                let dest = "patch.diff".to_string();
                let mut apply = Step::new("apply_patch_file").with_param("patch", dest.clone());
                if let Some(subdir) = p.subdir {
                    apply = apply.with_param("subdir", subdir);
                }
                Ok(vec![
                    Step::new("download_file")
                        .with_param("url", url)
                        .with_param("dest", dest),
                    apply,
                ])
            }
            (None, Some(data)) => {
                let mut apply = Step::new("apply_patch_file").with_param("data", data);
                if let Some(subdir) = p.subdir {
                    apply = apply.with_param("subdir", subdir);
                }
                Ok(vec![apply])
            }
            (None, None) => Err(CoreError::BadParam(
                "apply_patch requires either url or data".to_string(),
            )),
            (Some(_), Some(_)) => unreachable!("checked above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_subdir_rejects_absolute() {
        assert!(validate_subdir("/etc").is_err());
    }

    #[test]
    fn validate_subdir_rejects_parent_crossing() {
        assert!(validate_subdir("../escape").is_err());
    }

    #[test]
    fn validate_subdir_accepts_relative() {
        assert!(validate_subdir("src/vendor").is_ok());
    }
}
