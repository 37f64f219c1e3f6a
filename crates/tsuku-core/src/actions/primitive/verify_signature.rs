//! `verify_signature` primitive (spec.md §4.3/§4.9): verifies a detached
//! OpenPGP signature over an already-downloaded file against a pinned key
//! fingerprint. Emitted by the `download` composite whenever a recipe
//! declares `signature_url`/`signature_key_url`/`signature_key_fingerprint`.

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::io::fetch;
use crate::io::verify::verify_detached_signature;
use crate::paths::ensure_within;
use crate::registry::{Action, Primitive};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct Params {
    dest: String,
    signature_url: String,
    signature_key_url: String,
    signature_key_fingerprint: String,
}

pub struct VerifySignature;

impl Action for VerifySignature {
    fn name(&self) -> &'static str {
        "verify_signature"
    }

    fn requires_network(&self) -> bool {
        true
    }
}

#[async_trait]
impl Primitive for VerifySignature {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: Params = params::decode(raw_params)?;

        let data_path = ensure_within(&ctx.work_dir.join(&p.dest), &ctx.work_dir)?;
        let data = tokio::fs::read(&data_path).await?;

        let client = fetch::build_client()?;
        let sig_path = ensure_within(
            &ctx.work_dir.join(format!("{}.asc", p.dest)),
            &ctx.work_dir,
        )?;
        fetch::fetch(&client, &p.signature_url, &sig_path, &ctx.cancel).await?;
        let key_path = ensure_within(
            &ctx.work_dir.join(format!("{}.key.asc", p.dest)),
            &ctx.work_dir,
        )?;
        fetch::fetch(&client, &p.signature_key_url, &key_path, &ctx.cancel).await?;

        let armored_signature = tokio::fs::read_to_string(&sig_path).await?;
        let armored_public_key = tokio::fs::read_to_string(&key_path).await?;

        verify_detached_signature(
            &data,
            &armored_signature,
            &armored_public_key,
            &p.signature_key_fingerprint,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_matches_emitted_step_action() {
        assert_eq!(VerifySignature.name(), "verify_signature");
    }
}
