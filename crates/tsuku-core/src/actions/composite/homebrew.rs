//! `homebrew` composite (spec.md §4.9): resolves a Homebrew bottle through
//! its GHCR-hosted OCI distribution and emits the fetch/extract/relocate
//! chain. No teacher equivalent; grounded purely on the spec's wire
//! contract since the pack carries no Homebrew/GHCR client.

use crate::actions::params;
use crate::context::EvalContext;
use crate::error::CoreError;
use crate::io::fetch;
use crate::plan::Step;
use crate::registry::{Action, Composite};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tsuku_schema::{Arch, Os};

const GHCR_TOKEN_URL: &str =
    "https://ghcr.io/token?service=ghcr.io&scope=repository:homebrew/core/{formula}:pull";
const GHCR_REGISTRY: &str = "https://ghcr.io/v2/homebrew/core";

#[derive(Debug, Deserialize)]
struct Params {
    formula: String,
}

/// The bottle tag Homebrew publishes for a given target platform.
///
/// # Errors
///
/// Returns `UnsupportedBinary` for platform/arch combinations Homebrew does
/// not currently bottle for (e.g. Linux/arm64 outside `arm64_linux`).
fn platform_tag(os: Os, arch: Arch) -> Result<&'static str, CoreError> {
    match (os, arch) {
        (Os::MacOs, Arch::Arm64) => Ok("arm64_sonoma"),
        (Os::MacOs, Arch::X86_64) => Ok("sonoma"),
        (Os::Linux, Arch::Arm64) => Ok("arm64_linux"),
        (Os::Linux, Arch::X86_64) => Ok("x86_64_linux"),
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct OciIndex {
    manifests: Vec<OciManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct OciManifestEntry {
    digest: String,
    annotations: Option<OciAnnotations>,
}

#[derive(Debug, Deserialize)]
struct OciAnnotations {
    #[serde(rename = "org.opencontainers.image.ref.name")]
    ref_name: Option<String>,
    #[serde(rename = "sh.brew.bottle.digest")]
    bottle_digest: Option<String>,
}

pub struct Homebrew;

impl Action for Homebrew {
    fn name(&self) -> &'static str {
        "homebrew"
    }

    fn requires_network(&self) -> bool {
        true
    }
}

fn strip_sha256_prefix(digest: &str) -> &str {
    digest.strip_prefix("sha256:").unwrap_or(digest)
}

#[async_trait]
impl Composite for Homebrew {
    async fn decompose(
        &self,
        eval_ctx: &EvalContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Vec<Step>, CoreError> {
        let p: Params = params::decode(raw_params)?;
        let tag_suffix = platform_tag(eval_ctx.platform.os, eval_ctx.platform.arch)?;
        let ref_name = format!("{}.{tag_suffix}", eval_ctx.version.as_str());

        let client = eval_ctx
            .http
            .clone()
            .unwrap_or_else(|| fetch::build_client().expect("default reqwest client"));

        let token_url = GHCR_TOKEN_URL.replace("{formula}", &p.formula);
        let token: TokenResponse = client
            .get(&token_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let index_url = format!("{GHCR_REGISTRY}/{}/manifests/list", p.formula);
        let index: OciIndex = client
            .get(&index_url)
            .bearer_auth(&token.token)
            .header(
                reqwest::header::ACCEPT,
                "application/vnd.oci.image.index.v1+json",
            )
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let entry = index
            .manifests
            .into_iter()
            .find(|m| {
                m.annotations
                    .as_ref()
                    .and_then(|a| a.ref_name.as_deref())
                    == Some(ref_name.as_str())
            })
            .ok_or_else(|| {
                CoreError::BadParam(format!(
                    "no bottle manifest for {} matching ref {ref_name}",
                    p.formula
                ))
            })?;

        let bottle_digest = entry
            .annotations
            .and_then(|a| a.bottle_digest)
            .unwrap_or(entry.digest);
        let checksum = strip_sha256_prefix(&bottle_digest).to_string();

        let blob_url = format!("{GHCR_REGISTRY}/{}/blobs/sha256:{checksum}", p.formula);
        let dest_name = format!("{}-{ref_name}.tar.gz", p.formula);

        let sample_dir = tempfile::tempdir()?;
        let sample_path = sample_dir.path().join(&dest_name);
        let sampled = fetch::fetch(&client, &blob_url, &sample_path, &eval_ctx.cancel).await?;

        if !sampled.sha256.eq_ignore_ascii_case(&checksum) {
            return Err(CoreError::ChecksumMismatch {
                expected: checksum,
                actual: sampled.sha256,
            });
        }

        Ok(vec![
            Step::new("download_file")
                .with_param("url", blob_url)
                .with_param("dest", dest_name.clone())
                .with_param("checksum", checksum.clone())
                .with_checksum(checksum)
                .with_size(sampled.size),
            Step::new("extract")
                .with_param("archive", dest_name)
                .with_param("strip_dirs", 2u64),
            Step::new("homebrew_relocate").with_param("formula", p.formula),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_tag_selects_arm64_sonoma_on_macos_arm64() {
        assert_eq!(platform_tag(Os::MacOs, Arch::Arm64).unwrap(), "arm64_sonoma");
    }

    #[test]
    fn platform_tag_selects_x86_64_linux_on_linux_x86_64() {
        assert_eq!(platform_tag(Os::Linux, Arch::X86_64).unwrap(), "x86_64_linux");
    }

    #[test]
    fn strip_sha256_prefix_removes_prefix_when_present() {
        assert_eq!(strip_sha256_prefix("sha256:abcd"), "abcd");
        assert_eq!(strip_sha256_prefix("abcd"), "abcd");
    }
}
