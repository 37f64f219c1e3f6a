//! `link_dependencies` primitive (spec.md §4.8): relative symlinks from
//! `install_dir/bin` to every declared runtime dependency's binaries.

use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::registry::{Action, Primitive};
use async_trait::async_trait;
use std::collections::BTreeMap;

pub struct LinkDependencies;

impl Action for LinkDependencies {
    fn name(&self) -> &'static str {
        "link_dependencies"
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

#[async_trait]
impl Primitive for LinkDependencies {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        _params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let bin_dir = ctx.install_dir.join("bin");
        tokio::fs::create_dir_all(&bin_dir).await?;

        for (name, version) in &ctx.dependencies {
            let dep_dir = ctx
                .tools_dir
                .join(format!("{name}-{}", version.as_str()))
                .join("bin");

            let mut entries = match tokio::fs::read_dir(&dep_dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(CoreError::Io(e)),
            };

            while let Some(entry) = entries.next_entry().await? {
                let file_name = entry.file_name();
                let link_path = bin_dir.join(&file_name);
                let relative_target =
                    pathdiff(&dep_dir.join(&file_name), &bin_dir).unwrap_or(entry.path());

                let _ = tokio::fs::remove_file(&link_path).await;
                #[cfg(unix)]
                tokio::fs::symlink(&relative_target, &link_path).await?;
            }
        }

        Ok(())
    }
}

/// Computes a relative path from `base` to `target`, assuming both share the
/// same root (siblings under `tools_dir`).
fn pathdiff(target: &std::path::Path, base: &std::path::Path) -> Option<std::path::PathBuf> {
    let target_components: Vec<_> = target.components().collect();
    let base_components: Vec<_> = base.components().collect();

    let common = target_components
        .iter()
        .zip(base_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = std::path::PathBuf::new();
    for _ in common..base_components.len() {
        result.push("..");
    }
    for component in &target_components[common..] {
        result.push(component.as_os_str());
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn pathdiff_computes_relative_sibling_path() {
        let target = Path::new("/tsuku/tools/jq-1.7/bin/jq");
        let base = Path::new("/tsuku/tools/foo-1.0/bin");
        assert_eq!(
            pathdiff(target, base).unwrap(),
            Path::new("../../jq-1.7/bin/jq")
        );
    }
}
