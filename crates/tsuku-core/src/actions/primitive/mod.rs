//! Primitive actions (C8): deterministic leaves.

pub mod apply_patch_file;
pub mod chmod;
pub mod download_file;
pub mod extract;
pub mod homebrew_relocate;
pub mod install_binaries;
pub mod install_libraries;
pub mod link_dependencies;
pub mod nix_realize;
pub mod require_system;
pub mod run_command;
pub mod set_env;
pub mod set_rpath;
pub mod setup_build_env;
pub mod verify_signature;

use crate::registry::{ActionKind, Registry};
use std::sync::Arc;

pub fn register_all(registry: &mut Registry) {
    registry.register(ActionKind::Primitive(Arc::new(download_file::DownloadFile)));
    registry.register(ActionKind::Primitive(Arc::new(extract::Extract)));
    registry.register(ActionKind::Primitive(Arc::new(chmod::Chmod)));
    registry.register(ActionKind::Primitive(Arc::new(
        install_binaries::InstallBinaries,
    )));
    registry.register(ActionKind::Primitive(Arc::new(
        install_libraries::InstallLibraries,
    )));
    registry.register(ActionKind::Primitive(Arc::new(
        link_dependencies::LinkDependencies,
    )));
    registry.register(ActionKind::Primitive(Arc::new(set_rpath::SetRpath)));
    registry.register(ActionKind::Primitive(Arc::new(set_env::SetEnv)));
    registry.register(ActionKind::Primitive(Arc::new(run_command::RunCommand)));
    registry.register(ActionKind::Primitive(Arc::new(
        setup_build_env::SetupBuildEnv,
    )));
    registry.register(ActionKind::Primitive(Arc::new(
        require_system::RequireSystem,
    )));
    registry.register(ActionKind::Primitive(Arc::new(
        require_system::FamilyInstall::new(require_system::PackageFamily::Apt),
    )));
    registry.register(ActionKind::Primitive(Arc::new(
        require_system::FamilyInstall::new(require_system::PackageFamily::Brew),
    )));
    registry.register(ActionKind::Primitive(Arc::new(
        require_system::FamilyInstall::new(require_system::PackageFamily::Dnf),
    )));
    registry.register(ActionKind::Primitive(Arc::new(
        homebrew_relocate::HomebrewRelocate,
    )));
    registry.register(ActionKind::Primitive(Arc::new(
        verify_signature::VerifySignature,
    )));
    registry.register(ActionKind::Primitive(Arc::new(
        apply_patch_file::ApplyPatchFile,
    )));
    registry.register(ActionKind::Primitive(Arc::new(nix_realize::NixRealize)));
}
