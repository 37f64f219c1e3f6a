//! Path and variable substitution (C1).
//!
//! `expand` is the only place allowed to turn a template string into an
//! absolute path; everything downstream validates with `ensure_within`
//! before touching the filesystem.

use crate::error::CoreError;
use dirs::home_dir;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Returns the tsuku root directory, or `None` if it cannot be resolved.
pub fn try_tsuku_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("TSUKU_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".tsuku"))
}

/// Returns the canonical tsuku home directory (`~/.tsuku`).
///
/// # Panics
///
/// Panics if neither `TSUKU_HOME` is set nor the user's home directory can
/// be resolved.
pub fn tsuku_home() -> PathBuf {
    try_tsuku_home().expect("could not determine home directory; set TSUKU_HOME to override")
}

pub fn tools_dir() -> PathBuf {
    tsuku_home().join("tools")
}

pub fn libs_dir() -> PathBuf {
    tsuku_home().join("libs")
}

pub fn staging_dir() -> PathBuf {
    tools_dir().join(".install")
}

pub fn download_cache_dir() -> PathBuf {
    tsuku_home().join("cache").join("downloads")
}

pub fn key_cache_dir() -> PathBuf {
    tsuku_home().join("cache").join("keys")
}

/// Extract the filename component of a URL, or empty string if none.
pub fn filename_from_url(url: &str) -> &str {
    url.split('/').next_back().unwrap_or("")
}

/// Regex for binary filenames used inside generated wrapper scripts.
const SAFE_FILENAME: &str = r"^[A-Za-z0-9._-]+$";

/// Validates that a wrapper-script filename cannot be abused for shell
/// injection.
///
/// # Errors
///
/// Returns `CoreError::BadParam` if the filename contains characters
/// outside `[A-Za-z0-9._-]`.
pub fn validate_wrapper_filename(name: &str) -> Result<(), CoreError> {
    let re = regex::Regex::new(SAFE_FILENAME).expect("static regex is valid");
    if re.is_match(name) {
        Ok(())
    } else {
        Err(CoreError::BadParam(format!(
            "unsafe wrapper filename: {name}"
        )))
    }
}

/// Validates an RPATH value is either a known relative token or an absolute
/// path rooted in `libs_dir`.
///
/// # Errors
///
/// Returns `CoreError::BadParam` if neither condition holds.
pub fn validate_rpath(rpath: &str, libs_dir: &Path) -> Result<(), CoreError> {
    const RELATIVE_TOKENS: &[&str] = &["$ORIGIN", "@executable_path", "@loader_path", "@rpath"];
    if RELATIVE_TOKENS.iter().any(|t| rpath.starts_with(t)) {
        return Ok(());
    }
    let path = Path::new(rpath);
    if path.is_absolute() && path.starts_with(libs_dir) {
        return Ok(());
    }
    Err(CoreError::BadParam(format!(
        "rpath must be a relative token ($ORIGIN/@executable_path/@loader_path/@rpath) or absolute under libs_dir: {rpath}"
    )))
}

/// Expands `{version}`, `{install_dir}`, `{work_dir}`, `{libs_dir}` and any
/// caller-supplied variables in `template`.
///
/// This is the only layer permitted to introduce absolute paths into a
/// Step's params.
pub fn expand(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// Verifies that `path`, once symlink-resolved, is a descendant of `root`.
///
/// Neither `path` nor `root` need to exist yet for the component-wise check
/// that runs when canonicalisation is impossible (e.g. a not-yet-created
/// destination file); if `path` exists it is canonicalised first so a
/// symlink cannot be used to later escape `root`.
///
/// # Errors
///
/// Returns `CoreError::PathEscape` if `path` is not contained in `root`.
pub fn ensure_within(path: &Path, root: &Path) -> Result<PathBuf, CoreError> {
    let root_canon = root
        .canonicalize()
        .unwrap_or_else(|_| normalize(root));

    let candidate = if path.exists() {
        path.canonicalize().unwrap_or_else(|_| normalize(path))
    } else {
        // Not-yet-created destination: normalize the parent if possible and
        // re-attach the final component so `..` tricks still get caught.
        let parent = path.parent().unwrap_or(path);
        let parent_canon = parent.canonicalize().unwrap_or_else(|_| normalize(parent));
        match path.file_name() {
            Some(name) => parent_canon.join(name),
            None => parent_canon,
        }
    };

    if candidate.starts_with(&root_canon) {
        Ok(candidate)
    } else {
        Err(CoreError::PathEscape {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        })
    }
}

/// Lexically normalizes `..`/`.` components without touching the
/// filesystem, for paths that do not exist yet.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_substitutes_known_vars() {
        let mut vars = HashMap::new();
        vars.insert("version".to_string(), "1.2.3".to_string());
        vars.insert("install_dir".to_string(), "/tsuku/tools/foo-1.2.3".to_string());
        let out = expand("{install_dir}/bin/foo-{version}", &vars);
        assert_eq!(out, "/tsuku/tools/foo-1.2.3/bin/foo-1.2.3");
    }

    #[test]
    fn ensure_within_accepts_descendant() {
        let dir = tempfile::tempdir().unwrap();
        let child = dir.path().join("bin/foo");
        std::fs::create_dir_all(child.parent().unwrap()).unwrap();
        std::fs::write(&child, b"x").unwrap();
        assert!(ensure_within(&child, dir.path()).is_ok());
    }

    #[test]
    fn ensure_within_rejects_parent_escape() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        std::fs::create_dir_all(&root).unwrap();
        let escape = root.join("../escaped");
        assert!(ensure_within(&escape, &root).is_err());
    }

    #[test]
    fn validate_wrapper_filename_rejects_shell_metacharacters() {
        assert!(validate_wrapper_filename("kubectl").is_ok());
        assert!(validate_wrapper_filename("kubectl; rm -rf /").is_err());
        assert!(validate_wrapper_filename("../escape").is_err());
    }

    #[test]
    fn validate_rpath_accepts_relative_tokens() {
        let libs = Path::new("/tsuku/libs");
        assert!(validate_rpath("$ORIGIN/../lib", libs).is_ok());
        assert!(validate_rpath("@executable_path/../lib", libs).is_ok());
    }

    #[test]
    fn validate_rpath_accepts_absolute_under_libs_dir() {
        let libs = Path::new("/tsuku/libs");
        assert!(validate_rpath("/tsuku/libs/openssl-3.0", libs).is_ok());
    }

    #[test]
    fn validate_rpath_rejects_absolute_outside_libs_dir() {
        let libs = Path::new("/tsuku/libs");
        assert!(validate_rpath("/usr/local/lib", libs).is_err());
    }
}
