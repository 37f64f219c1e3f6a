//! `download_file` primitive (spec.md §4.8).

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::io::fetch;
use crate::paths::ensure_within;
use crate::registry::{Action, ActionDependencies, Primitive};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct Params {
    url: String,
    dest: String,
    #[serde(default, alias = "sha256")]
    checksum: Option<String>,
}

pub struct DownloadFile;

impl Action for DownloadFile {
    fn name(&self) -> &'static str {
        "download_file"
    }

    fn requires_network(&self) -> bool {
        true
    }

    fn dependencies(&self) -> ActionDependencies {
        ActionDependencies::default()
    }
}

#[async_trait]
impl Primitive for DownloadFile {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: Params = params::decode(raw_params)?;

        let dest = ensure_within(&ctx.work_dir.join(&p.dest), &ctx.work_dir)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let client = fetch::build_client()?;
        let result = fetch::fetch(&client, &p.url, &dest, &ctx.cancel).await?;

        if let Some(expected) = &p.checksum {
            if !result.sha256.eq_ignore_ascii_case(expected) {
                return Err(CoreError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual: result.sha256,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_decode_accepts_sha256_alias() {
        let mut map = BTreeMap::new();
        map.insert("url".to_string(), serde_json::json!("https://example.com/a"));
        map.insert("dest".to_string(), serde_json::json!("a.tar.gz"));
        map.insert("sha256".to_string(), serde_json::json!("deadbeef"));

        let decoded: Params = params::decode(&map).unwrap();
        assert_eq!(decoded.checksum.as_deref(), Some("deadbeef"));
    }
}
