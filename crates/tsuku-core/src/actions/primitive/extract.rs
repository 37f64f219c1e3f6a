//! `extract` primitive (spec.md §4.8): unpacks an archive under `work_dir`.

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::io::extract::{self, ArchiveFormat};
use crate::paths::ensure_within;
use crate::registry::{Action, Primitive};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct Params {
    archive: String,
    format: Option<String>,
    #[serde(default)]
    strip_dirs: usize,
}

fn parse_format(name: &str) -> Result<ArchiveFormat, CoreError> {
    match name {
        "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
        "tar.xz" | "txz" => Ok(ArchiveFormat::TarXz),
        "tar.bz2" | "tbz" | "tbz2" => Ok(ArchiveFormat::TarBz2),
        "tar" => Ok(ArchiveFormat::Tar),
        "zip" => Ok(ArchiveFormat::Zip),
        other => Err(CoreError::BadParam(format!("unknown archive format: {other}"))),
    }
}

pub struct Extract;

impl Action for Extract {
    fn name(&self) -> &'static str {
        "extract"
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

#[async_trait]
impl Primitive for Extract {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: Params = params::decode(raw_params)?;

        let archive_path = ensure_within(&ctx.work_dir.join(&p.archive), &ctx.work_dir)?;
        let format = p.format.as_deref().map(parse_format).transpose()?;

        extract::extract(&archive_path, &ctx.work_dir, format, p.strip_dirs)?;
        Ok(())
    }
}
