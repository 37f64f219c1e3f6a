//! `github_archive` composite (spec.md §4.9): builds a GitHub tarball URL,
//! samples it for a checksum, and emits the fetch/extract/install chain.

use crate::actions::params;
use crate::context::EvalContext;
use crate::error::CoreError;
use crate::io::fetch;
use crate::plan::Step;
use crate::registry::{Action, Composite};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Deserialize)]
struct Params {
    repo: String,
    #[serde(default)]
    tag_prefix: Option<String>,
    #[serde(default)]
    version_separator: Option<String>,
    #[serde(default)]
    strip_dirs: Option<usize>,
    #[serde(default)]
    binaries: HashMap<String, String>,
}

pub struct GithubArchive;

impl Action for GithubArchive {
    fn name(&self) -> &'static str {
        "github_archive"
    }

    fn requires_network(&self) -> bool {
        true
    }
}

fn tag_for(version: &str, tag_prefix: Option<&str>, separator: Option<&str>) -> String {
    let prefix = tag_prefix.unwrap_or("v");
    match separator {
        Some(sep) => format!("{prefix}{}", version.replace('.', sep)),
        None => format!("{prefix}{version}"),
    }
}

fn tarball_url(repo: &str, tag: &str) -> String {
    format!("https://github.com/{repo}/archive/refs/tags/{tag}.tar.gz")
}

#[async_trait]
impl Composite for GithubArchive {
    async fn decompose(
        &self,
        eval_ctx: &EvalContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Vec<Step>, CoreError> {
        let p: Params = params::decode(raw_params)?;

        let tag = tag_for(
            eval_ctx.version.as_str(),
            p.tag_prefix.as_deref(),
            p.version_separator.as_deref(),
        );
        let url = tarball_url(&p.repo, &tag);

        let client = eval_ctx
            .http
            .clone()
            .unwrap_or_else(|| fetch::build_client().expect("default reqwest client"));
        let dest_name = format!("{}.tar.gz", p.repo.replace('/', "-"));

        let sample_dir = tempfile::tempdir()?;
        let sample_path = sample_dir.path().join(&dest_name);
        let sampled = fetch::fetch(&client, &url, &sample_path, &eval_ctx.cancel).await?;

        let mut steps = vec![
            Step::new("download_file")
                .with_param("url", url)
                .with_param("dest", dest_name.clone())
                .with_param("checksum", sampled.sha256.clone())
                .with_checksum(sampled.sha256)
                .with_size(sampled.size),
            Step::new("extract")
                .with_param("archive", dest_name)
                .with_param("strip_dirs", p.strip_dirs.unwrap_or(1) as u64),
        ];

        if !p.binaries.is_empty() {
            steps.push(
                Step::new("chmod").with_param(
                    "paths",
                    p.binaries.values().cloned().collect::<Vec<_>>(),
                ),
            );
            let outputs: serde_json::Map<String, serde_json::Value> = p
                .binaries
                .iter()
                .map(|(src, dest)| (src.clone(), serde_json::Value::String(dest.clone())))
                .collect();
            steps.push(
                Step::new("install_binaries")
                    .with_param("outputs", serde_json::Value::Object(outputs)),
            );
        }

        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_for_defaults_to_v_prefix() {
        assert_eq!(tag_for("1.29.3", None, None), "v1.29.3");
    }

    #[test]
    fn tag_for_honours_custom_prefix_and_separator() {
        assert_eq!(tag_for("1.29.3", Some("release-"), Some("_")), "release-1_29_3");
    }

    #[test]
    fn tarball_url_matches_github_convention() {
        assert_eq!(
            tarball_url("jqlang/jq", "v1.7.1"),
            "https://github.com/jqlang/jq/archive/refs/tags/v1.7.1.tar.gz"
        );
    }
}
