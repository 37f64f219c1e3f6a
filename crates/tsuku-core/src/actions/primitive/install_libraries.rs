//! `install_libraries` primitive (spec.md §4.8): glob-copy libraries into
//! `install_dir/lib`, preserving symlinks that stay within `install_dir`.

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::paths::ensure_within;
use crate::registry::{Action, Primitive};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

#[derive(Debug, Deserialize)]
struct Params {
    patterns: Vec<String>,
}

pub struct InstallLibraries;

impl Action for InstallLibraries {
    fn name(&self) -> &'static str {
        "install_libraries"
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

#[async_trait]
impl Primitive for InstallLibraries {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: Params = params::decode(raw_params)?;
        let lib_dir = ctx.install_dir.join("lib");
        tokio::fs::create_dir_all(&lib_dir).await?;

        let mut matched = BTreeSet::new();
        for pattern in &p.patterns {
            let full_pattern = ctx.work_dir.join(pattern);
            let glob_pattern = full_pattern
                .to_str()
                .ok_or_else(|| CoreError::BadParam(format!("non-UTF8 pattern: {pattern}")))?;
            for entry in glob::glob(glob_pattern)
                .map_err(|e| CoreError::BadParam(format!("invalid glob {pattern}: {e}")))?
            {
                let path = entry.map_err(|e| CoreError::BadParam(e.to_string()))?;
                matched.insert(path);
            }
        }

        for src in matched {
            let file_name = src
                .file_name()
                .ok_or_else(|| CoreError::BadParam(format!("pattern matched no filename: {}", src.display())))?;
            let dest = ensure_within(&lib_dir.join(file_name), &ctx.install_dir)?;

            let metadata = tokio::fs::symlink_metadata(&src).await?;
            if metadata.file_type().is_symlink() {
                let target = tokio::fs::read_link(&src).await?;
                if target.is_absolute() {
                    return Err(CoreError::PathEscape {
                        path: target,
                        root: ctx.install_dir.clone(),
                    });
                }
                let resolved = lib_dir.join(&target);
                ensure_within(&resolved, &ctx.install_dir)?;

                #[cfg(unix)]
                {
                    let _ = tokio::fs::remove_file(&dest).await;
                    tokio::fs::symlink(&target, &dest).await?;
                }
            } else {
                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::copy(&src, &dest).await?;
            }
        }

        Ok(())
    }
}
