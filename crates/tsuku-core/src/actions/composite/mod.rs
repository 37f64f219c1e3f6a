//! Composite actions (C9): decompose into primitive Steps at plan time.

pub mod apply_patch;
pub mod cargo_install;
pub mod download;
pub mod fossil_archive;
pub mod gem_install;
pub mod github_archive;
pub mod go_install;
pub mod homebrew;
pub mod homebrew_source;
pub mod nix_install;
pub mod npm_install;
pub mod pipx_install;

use crate::registry::{ActionKind, Registry};
use std::sync::Arc;

pub fn register_all(registry: &mut Registry) {
    registry.register(ActionKind::Composite(Arc::new(download::Download)));
    registry.register(ActionKind::Composite(Arc::new(github_archive::GithubArchive)));
    registry.register(ActionKind::Composite(Arc::new(fossil_archive::FossilArchive)));
    registry.register(ActionKind::Composite(Arc::new(homebrew::Homebrew)));
    registry.register(ActionKind::Composite(Arc::new(homebrew_source::HomebrewSource)));
    registry.register(ActionKind::Composite(Arc::new(apply_patch::ApplyPatch)));
    registry.register(ActionKind::Composite(Arc::new(gem_install::GemInstall)));
    registry.register(ActionKind::Composite(Arc::new(npm_install::NpmInstall)));
    registry.register(ActionKind::Composite(Arc::new(pipx_install::PipxInstall)));
    registry.register(ActionKind::Composite(Arc::new(go_install::GoInstall)));
    registry.register(ActionKind::Composite(Arc::new(cargo_install::CargoInstall)));
    registry.register(ActionKind::Composite(Arc::new(nix_install::NixInstall)));
}
