//! `homebrew_relocate` primitive support (spec.md §4.6.2).
//!
//! No teacher equivalent; built from the magic-byte detection idiom
//! already present in `relinker.rs`/`relocate::detect_format`, generalized
//! to a tree walk that rewrites Homebrew's `@@HOMEBREW_PREFIX@@`/
//! `@@HOMEBREW_CELLAR@@` placeholders in text files and collects binaries
//! for a post-pass RPATH patch.

use crate::error::CoreError;
use crate::relocate::{self, BinaryFormat};
use std::fs;
use std::path::{Path, PathBuf};

const PREFIX_PLACEHOLDER: &str = "@@HOMEBREW_PREFIX@@";
const CELLAR_PLACEHOLDER: &str = "@@HOMEBREW_CELLAR@@";
/// Hard limit of in-place binary substitution: the placeholder itself is
/// 19 bytes (`@@HOMEBREW_PREFIX@@`.len()), and a Mach-O/ELF string table
/// entry can't grow without relocating everything after it.
const MAX_INPLACE_PATH_LEN: usize = 19;

/// Outcome of walking one install tree for Homebrew placeholder
/// substitution.
#[derive(Debug, Default)]
pub struct RelocationPlan {
    /// Binaries that need a follow-up RPATH patch (too long to patch
    /// in-place, or simply collected for the platform RPATH tool).
    pub binaries_needing_rpath: Vec<PathBuf>,
    /// Binaries whose embedded path is too long to substitute in place and
    /// must fall back to a wrapper script instead.
    pub needs_wrapper: Vec<PathBuf>,
}

fn has_nul_in_first_8kib(path: &Path) -> std::io::Result<bool> {
    use std::io::Read;
    let mut f = fs::File::open(path)?;
    let mut buf = [0u8; 8192];
    let n = f.read(&mut buf)?;
    Ok(buf[..n].contains(&0))
}

fn rewrite_text_file(path: &Path, final_install_path: &str) -> Result<(), CoreError> {
    let contents = fs::read_to_string(path)?;
    if !contents.contains(PREFIX_PLACEHOLDER) && !contents.contains(CELLAR_PLACEHOLDER) {
        return Ok(());
    }
    let rewritten = contents
        .replace(PREFIX_PLACEHOLDER, final_install_path)
        .replace(CELLAR_PLACEHOLDER, final_install_path);
    fs::write(path, rewritten)?;
    Ok(())
}

/// Walks `root`, rewriting placeholders in text files and collecting
/// binaries for RPATH patching. Symlinks are skipped entirely.
///
/// # Errors
///
/// Returns an I/O error if the tree cannot be read, or `BadParam` if
/// `final_install_path` exceeds the 19-byte in-place substitution limit
/// and no wrapper fallback is requested by the caller (the caller decides
/// policy; this function only classifies).
pub fn plan_relocation(root: &Path, final_install_path: &str) -> Result<RelocationPlan, CoreError> {
    let mut plan = RelocationPlan::default();
    let too_long = final_install_path.len() > MAX_INPLACE_PATH_LEN;

    for entry in walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path_is_symlink() {
            continue;
        }

        match relocate::detect_format(path) {
            Some(BinaryFormat::Elf | BinaryFormat::MachO | BinaryFormat::FatMachO) => {
                if too_long {
                    plan.needs_wrapper.push(path.to_path_buf());
                } else {
                    plan.binaries_needing_rpath.push(path.to_path_buf());
                }
            }
            None => {
                if has_nul_in_first_8kib(path).unwrap_or(true) {
                    continue;
                }
                rewrite_text_file(path, final_install_path)?;
            }
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_prefix_and_cellar_placeholders_in_text_files() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("env.sh");
        fs::write(
            &script,
            "export LIBDIR=@@HOMEBREW_PREFIX@@/lib\nexport CELLAR=@@HOMEBREW_CELLAR@@/foo\n",
        )
        .unwrap();

        let plan = plan_relocation(dir.path(), "/tsuku/tools/foo-1.0").unwrap();
        assert!(plan.binaries_needing_rpath.is_empty());

        let contents = fs::read_to_string(&script).unwrap();
        assert!(contents.contains("/tsuku/tools/foo-1.0/lib"));
        assert!(!contents.contains("@@HOMEBREW_PREFIX@@"));
    }

    #[test]
    fn collects_elf_binaries_for_rpath_pass_when_path_fits() {
        let dir = tempfile::tempdir().unwrap();
        let bin_dir = dir.path().join("bin");
        fs::create_dir_all(&bin_dir).unwrap();
        fs::write(bin_dir.join("tool"), [0x7f, 0x45, 0x4c, 0x46, 0, 0, 0, 0]).unwrap();

        let plan = plan_relocation(dir.path(), "/tsuku/tools/a-1").unwrap();
        assert_eq!(plan.binaries_needing_rpath.len(), 1);
        assert!(plan.needs_wrapper.is_empty());
    }

    #[test]
    fn falls_back_to_wrapper_when_path_exceeds_19_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let bin_dir = dir.path().join("bin");
        fs::create_dir_all(&bin_dir).unwrap();
        fs::write(bin_dir.join("tool"), [0x7f, 0x45, 0x4c, 0x46, 0, 0, 0, 0]).unwrap();

        let long_path = "/home/someuser/.tsuku/tools/somewhat-long-name-1.2.3";
        assert!(long_path.len() > MAX_INPLACE_PATH_LEN);
        let plan = plan_relocation(dir.path(), long_path).unwrap();
        assert_eq!(plan.needs_wrapper.len(), 1);
        assert!(plan.binaries_needing_rpath.is_empty());
    }
}
