//! `require_system`/`system_dependency` and the per-family delegated
//! installers (spec.md §4.8): read-only queries against the host package
//! manager. None of these ever execute a privileged command; a miss is
//! reported as `CoreError::DependencyMissing` for the caller to aggregate.

use crate::actions::params;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::registry::{Action, ImplicitConstraint, IsExternallyManaged, Primitive};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tsuku_schema::Os;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFamily {
    Apt,
    Brew,
    Dnf,
}

impl PackageFamily {
    fn query_command(self, package: &str) -> (&'static str, Vec<String>) {
        match self {
            PackageFamily::Apt => ("dpkg", vec!["-s".to_string(), package.to_string()]),
            PackageFamily::Brew => ("brew", vec!["list".to_string(), package.to_string()]),
            PackageFamily::Dnf => ("rpm", vec!["-q".to_string(), package.to_string()]),
        }
    }

    fn install_command(self, packages: &[String]) -> String {
        let joined = packages.join(" ");
        match self {
            PackageFamily::Apt => format!("sudo apt-get install -y {joined}"),
            PackageFamily::Brew => format!("brew install {joined}"),
            PackageFamily::Dnf => format!("sudo dnf install -y {joined}"),
        }
    }

    fn name(self) -> &'static str {
        match self {
            PackageFamily::Apt => "apt",
            PackageFamily::Brew => "brew",
            PackageFamily::Dnf => "dnf",
        }
    }
}

fn package_present(family: PackageFamily, package: &str) -> bool {
    let (command, args) = family.query_command(package);
    std::process::Command::new(command)
        .args(&args)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Checks every package in `packages` against `family`'s manager, returning
/// `DependencyMissing` listing every absent package in one shot.
fn check_family(family: PackageFamily, packages: &[String]) -> Result<(), CoreError> {
    let missing: Vec<String> = packages
        .iter()
        .filter(|pkg| !package_present(family, pkg))
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CoreError::DependencyMissing {
            install_command: family.install_command(&missing),
            family: family.name().to_string(),
            packages: missing,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RequireSystemParams {
    #[serde(default)]
    apt: Vec<String>,
    #[serde(default)]
    brew: Vec<String>,
    #[serde(default)]
    dnf: Vec<String>,
}

/// `require_system` / `system_dependency`: checks whichever of the declared
/// per-family package lists applies to the current platform.
pub struct RequireSystem;

impl Action for RequireSystem {
    fn name(&self) -> &'static str {
        "require_system"
    }
}

#[async_trait]
impl Primitive for RequireSystem {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: RequireSystemParams = params::decode(raw_params)?;

        match ctx.platform.os {
            Os::Linux if !p.apt.is_empty() => check_family(PackageFamily::Apt, &p.apt),
            Os::Linux if !p.dnf.is_empty() => check_family(PackageFamily::Dnf, &p.dnf),
            Os::MacOs if !p.brew.is_empty() => check_family(PackageFamily::Brew, &p.brew),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FamilyParams {
    packages: Vec<String>,
}

/// One delegated installer per package family (`apt_install`, `brew_install`,
/// `dnf_install`, …): same read-only semantics as `require_system`, plus a
/// human-facing `Describe`.
pub struct FamilyInstall {
    family: PackageFamily,
}

impl FamilyInstall {
    pub fn new(family: PackageFamily) -> Self {
        Self { family }
    }
}

impl Action for FamilyInstall {
    fn name(&self) -> &'static str {
        match self.family {
            PackageFamily::Apt => "apt_install",
            PackageFamily::Brew => "brew_install",
            PackageFamily::Dnf => "dnf_install",
        }
    }
}

impl ImplicitConstraint for FamilyInstall {
    fn allowed_on(&self, os: Os) -> bool {
        match self.family {
            PackageFamily::Apt | PackageFamily::Dnf => os == Os::Linux,
            PackageFamily::Brew => os == Os::MacOs,
        }
    }
}

impl IsExternallyManaged for FamilyInstall {}

impl crate::registry::Describe for FamilyInstall {
    fn describe(&self, raw_params: &BTreeMap<String, serde_json::Value>) -> String {
        match params::decode::<FamilyParams>(raw_params) {
            Ok(p) => self.family.install_command(&p.packages),
            Err(e) => format!("<invalid packages param: {e}>"),
        }
    }
}

#[async_trait]
impl Primitive for FamilyInstall {
    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        raw_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        let p: FamilyParams = params::decode(raw_params)?;
        check_family(self.family, &p.packages)
    }
}
