//! `fossil_archive` composite (spec.md §4.9): Fossil's unauthenticated
//! `tarball/{tag}/{project}.tar.gz` convention.

use crate::actions::params;
use crate::context::EvalContext;
use crate::error::CoreError;
use crate::io::fetch;
use crate::plan::Step;
use crate::registry::{Action, Composite};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct Params {
    repo: String,
    project: String,
    #[serde(default)]
    tag_prefix: Option<String>,
    #[serde(default)]
    strip_dirs: Option<usize>,
}

pub struct FossilArchive;

impl Action for FossilArchive {
    fn name(&self) -> &'static str {
        "fossil_archive"
    }

    fn requires_network(&self) -> bool {
        true
    }
}

fn tarball_url(repo: &str, tag_prefix: Option<&str>, version: &str, project: &str) -> String {
    let tag = format!("{}{version}", tag_prefix.unwrap_or(""));
    format!("{repo}/tarball/{tag}/{project}.tar.gz")
}

#[async_trait]
impl Composite for FossilArchive {
    async fn decompose(
        &self,
        eval_ctx: &EvalContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Vec<Step>, CoreError> {
        let p: Params = params::decode(raw_params)?;

        let url = tarball_url(
            &p.repo,
            p.tag_prefix.as_deref(),
            eval_ctx.version.as_str(),
            &p.project,
        );

        let client = eval_ctx
            .http
            .clone()
            .unwrap_or_else(|| fetch::build_client().expect("default reqwest client"));
        let dest_name = format!("{}.tar.gz", p.project);

        let sample_dir = tempfile::tempdir()?;
        let sample_path = sample_dir.path().join(&dest_name);
        let sampled = fetch::fetch(&client, &url, &sample_path, &eval_ctx.cancel).await?;

        Ok(vec![
            Step::new("download_file")
                .with_param("url", url)
                .with_param("dest", dest_name.clone())
                .with_param("checksum", sampled.sha256.clone())
                .with_checksum(sampled.sha256)
                .with_size(sampled.size),
            Step::new("extract")
                .with_param("archive", dest_name)
                .with_param("strip_dirs", p.strip_dirs.unwrap_or(1) as u64),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tarball_url_matches_fossil_convention() {
        assert_eq!(
            tarball_url("https://sqlite.org/src", Some("version-"), "3.45.1", "sqlite"),
            "https://sqlite.org/src/tarball/version-3.45.1/sqlite.tar.gz"
        );
    }
}
