//! `download` composite (spec.md §4.9): samples the artifact at plan time to
//! pin a checksum, then emits `download_file` (+ signature verification).

use crate::actions::params;
use crate::context::EvalContext;
use crate::error::CoreError;
use crate::io::fetch;
use crate::io::verify::validate_fingerprint;
use crate::plan::Step;
use crate::registry::{Action, Composite};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct Params {
    url: String,
    dest: String,
    #[serde(default)]
    signature_url: Option<String>,
    #[serde(default)]
    signature_key_url: Option<String>,
    #[serde(default)]
    signature_key_fingerprint: Option<String>,
}

pub struct Download;

impl Action for Download {
    fn name(&self) -> &'static str {
        "download"
    }

    fn requires_network(&self) -> bool {
        true
    }
}

#[async_trait]
impl Composite for Download {
    async fn decompose(
        &self,
        eval_ctx: &EvalContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Vec<Step>, CoreError> {
        let p: Params = params::decode(raw_params)?;

        if let Some(fingerprint) = &p.signature_key_fingerprint {
            validate_fingerprint(fingerprint)?;
            if p.signature_url.is_none() || p.signature_key_url.is_none() {
                return Err(CoreError::BadParam(
                    "signature_key_fingerprint requires signature_url and signature_key_url"
                        .to_string(),
                ));
            }
        }

        let client = eval_ctx
            .http
            .clone()
            .unwrap_or_else(|| fetch::build_client().expect("default reqwest client"));

        let sample_dir = tempfile::tempdir()?;
        let sample_path = sample_dir.path().join(&p.dest);
        let sampled = fetch::fetch(&client, &p.url, &sample_path, &eval_ctx.cancel).await?;

        let mut step = Step::new("download_file")
            .with_param("url", p.url.clone())
            .with_param("dest", p.dest.clone())
            .with_checksum(sampled.sha256.clone())
            .with_size(sampled.size);
        step = step.with_param("checksum", sampled.sha256.clone());

        let mut steps = vec![step];

        if let (Some(sig_url), Some(key_url), Some(fingerprint)) = (
            p.signature_url.as_ref(),
            p.signature_key_url.as_ref(),
            p.signature_key_fingerprint.as_ref(),
        ) {
            steps.push(
                Step::new("verify_signature")
                    .with_param("signature_url", sig_url.clone())
                    .with_param("signature_key_url", key_url.clone())
                    .with_param("signature_key_fingerprint", fingerprint.clone())
                    .with_param("dest", p.dest.clone()),
            );
        }

        Ok(steps)
    }
}
