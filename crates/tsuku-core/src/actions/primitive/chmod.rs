//! `chmod` primitive (spec.md §4.8): mode changes confined to `work_dir`.

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::paths::ensure_within;
use crate::registry::{Action, Primitive};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

const DEFAULT_MODE: u32 = 0o755;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Entry {
    Bare(String),
    WithMode { path: String, mode: Option<String> },
}

#[derive(Debug, Deserialize)]
struct Params {
    paths: Vec<Entry>,
}

fn parse_mode(mode: Option<&str>) -> Result<u32, CoreError> {
    match mode {
        None => Ok(DEFAULT_MODE),
        Some(m) => {
            let trimmed = m.trim_start_matches('0');
            let digits = if trimmed.is_empty() { "0" } else { trimmed };
            u32::from_str_radix(digits, 8)
                .map_err(|e| CoreError::BadParam(format!("invalid mode {m}: {e}")))
        }
    }
}

pub struct Chmod;

impl Action for Chmod {
    fn name(&self) -> &'static str {
        "chmod"
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

#[async_trait]
impl Primitive for Chmod {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: Params = params::decode(raw_params)?;

        for entry in &p.paths {
            let (rel, mode) = match entry {
                Entry::Bare(path) => (path.as_str(), DEFAULT_MODE),
                Entry::WithMode { path, mode } => (path.as_str(), parse_mode(mode.as_deref())?),
            };

            let absolute = ensure_within(&ctx.work_dir.join(rel), &ctx.work_dir)?;
            let metadata = tokio::fs::symlink_metadata(&absolute).await?;
            if metadata.file_type().is_symlink() {
                continue;
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(mode);
                tokio::fs::set_permissions(&absolute, perms).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mode_defaults_to_0755() {
        assert_eq!(parse_mode(None).unwrap(), 0o755);
    }

    #[test]
    fn parse_mode_accepts_octal_string() {
        assert_eq!(parse_mode(Some("0644")).unwrap(), 0o644);
        assert_eq!(parse_mode(Some("755")).unwrap(), 0o755);
    }
}
