//! Archive extractor (C5).
//!
//! Grounded on the legacy `src/io/extract.rs` tar/zip handling (Zip-Slip
//! guard, single-top-level-dir stripping), generalized to tar.xz/tar.bz2
//! and to arbitrary `strip_dirs: N`, plus per-entry symlink-escape checks
//! not present in the teacher's version.

use crate::error::CoreError;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
    TarBz2,
    Tar,
    Zip,
}

/// Detects format from a filename's extension.
///
/// # Errors
///
/// Returns `CoreError::BadParam` if no recognised extension is present.
pub fn detect_format(path: &Path) -> Result<ArchiveFormat, CoreError> {
    let name = path.to_string_lossy().to_lowercase();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Ok(ArchiveFormat::TarGz)
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        Ok(ArchiveFormat::TarXz)
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz") || name.ends_with(".tbz2") {
        Ok(ArchiveFormat::TarBz2)
    } else if name.ends_with(".tar") {
        Ok(ArchiveFormat::Tar)
    } else if name.ends_with(".zip") {
        Ok(ArchiveFormat::Zip)
    } else {
        Err(CoreError::BadParam(format!(
            "cannot detect archive format from filename: {}",
            path.display()
        )))
    }
}

/// Strips the first `strip_dirs` path components from `path`. Returns
/// `None` if `path` has fewer components, meaning the entry is skipped.
fn strip_components(path: &Path, strip_dirs: usize) -> Option<PathBuf> {
    let components: Vec<Component> = path.components().collect();
    if components.len() <= strip_dirs {
        return None;
    }
    Some(components[strip_dirs..].iter().collect())
}

/// Resolves `dest_dir.join(relative)` and verifies it stays within
/// `dest_dir`, rejecting absolute entries and `..` traversal.
fn resolve_entry_path(dest_dir: &Path, relative: &Path) -> Result<PathBuf, CoreError> {
    if relative.is_absolute() || relative.components().any(|c| c == Component::ParentDir) {
        return Err(CoreError::ArchiveTraversal(relative.display().to_string()));
    }
    let joined = dest_dir.join(relative);
    if !joined.starts_with(dest_dir) {
        return Err(CoreError::ArchiveTraversal(relative.display().to_string()));
    }
    Ok(joined)
}

/// Verifies a symlink entry's target does not escape `dest_dir`.
fn validate_symlink_target(entry_path: &Path, target: &Path, dest_dir: &Path) -> Result<(), CoreError> {
    let resolved = if target.is_absolute() {
        target.to_path_buf()
    } else {
        entry_path
            .parent()
            .unwrap_or(entry_path)
            .join(target)
    };
    let normalized = normalize_lexically(&resolved);
    if !normalized.starts_with(dest_dir) {
        return Err(CoreError::ArchiveTraversal(format!(
            "symlink {} escapes extraction root via target {}",
            entry_path.display(),
            target.display()
        )));
    }
    Ok(())
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Extracts a tar-family archive from `reader` into `dest_dir`.
///
/// # Errors
///
/// Returns `ArchiveTraversal` for any entry whose resolved path or symlink
/// target escapes `dest_dir`, or an I/O error.
fn extract_tar<R: Read>(
    reader: R,
    dest_dir: &Path,
    strip_dirs: usize,
) -> Result<Vec<PathBuf>, CoreError> {
    fs::create_dir_all(dest_dir)?;
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_unpack_xattrs(false);

    let mut extracted = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();

        let Some(relative) = strip_components(&entry_path, strip_dirs) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let absolute = resolve_entry_path(dest_dir, &relative)?;

        if entry.header().entry_type().is_symlink() {
            let link_name = entry
                .link_name()?
                .ok_or_else(|| CoreError::ArchiveTraversal(relative.display().to_string()))?
                .into_owned();
            validate_symlink_target(&absolute, &link_name, dest_dir)?;
            if let Some(parent) = absolute.parent() {
                fs::create_dir_all(parent)?;
            }
            entry.unpack(&absolute)?;
            extracted.push(absolute);
            continue;
        }

        if entry.header().entry_type().is_dir() {
            fs::create_dir_all(&absolute)?;
            continue;
        }

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&absolute)?;
        extracted.push(absolute);
    }

    Ok(extracted)
}

fn extract_zip(
    archive_path: &Path,
    dest_dir: &Path,
    strip_dirs: usize,
) -> Result<Vec<PathBuf>, CoreError> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| CoreError::BadParam(format!("invalid zip archive: {e}")))?;
    fs::create_dir_all(dest_dir)?;

    let mut extracted = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| CoreError::BadParam(e.to_string()))?;
        let Some(enclosed) = file.enclosed_name() else {
            continue;
        };
        let Some(relative) = strip_components(&enclosed, strip_dirs) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let absolute = resolve_entry_path(dest_dir, &relative)?;

        if file.is_dir() {
            fs::create_dir_all(&absolute)?;
            continue;
        }

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = fs::File::create(&absolute)?;
        std::io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute, fs::Permissions::from_mode(mode))?;
        }

        extracted.push(absolute);
    }

    Ok(extracted)
}

/// Extracts `archive_path` into `dest_dir`, detecting format unless
/// `format` is given explicitly.
///
/// # Errors
///
/// See `extract_tar`/`extract_zip`.
pub fn extract(
    archive_path: &Path,
    dest_dir: &Path,
    format: Option<ArchiveFormat>,
    strip_dirs: usize,
) -> Result<Vec<PathBuf>, CoreError> {
    let format = match format {
        Some(f) => f,
        None => detect_format(archive_path)?,
    };

    match format {
        ArchiveFormat::TarGz => {
            let file = fs::File::open(archive_path)?;
            let decoder = flate2::read::GzDecoder::new(std::io::BufReader::new(file));
            extract_tar(decoder, dest_dir, strip_dirs)
        }
        ArchiveFormat::TarXz => {
            let file = fs::File::open(archive_path)?;
            let decoder = xz2::read::XzDecoder::new(std::io::BufReader::new(file));
            extract_tar(decoder, dest_dir, strip_dirs)
        }
        ArchiveFormat::TarBz2 => {
            let file = fs::File::open(archive_path)?;
            let decoder = bzip2::read::BzDecoder::new(std::io::BufReader::new(file));
            extract_tar(decoder, dest_dir, strip_dirs)
        }
        ArchiveFormat::Tar => {
            let file = fs::File::open(archive_path)?;
            extract_tar(std::io::BufReader::new(file), dest_dir, strip_dirs)
        }
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir, strip_dirs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        let tar_bytes = builder.into_inner().unwrap();

        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&tar_bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn detect_format_recognises_extensions() {
        assert_eq!(detect_format(Path::new("a.tar.gz")).unwrap(), ArchiveFormat::TarGz);
        assert_eq!(detect_format(Path::new("a.tar.xz")).unwrap(), ArchiveFormat::TarXz);
        assert_eq!(detect_format(Path::new("a.tar.bz2")).unwrap(), ArchiveFormat::TarBz2);
        assert_eq!(detect_format(Path::new("a.zip")).unwrap(), ArchiveFormat::Zip);
        assert!(detect_format(Path::new("a.bin")).is_err());
    }

    #[test]
    fn extracts_tar_gz_with_strip_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("pkg.tar.gz");
        fs::write(
            &archive_path,
            make_tar_gz(&[("pkg-1.0/bin/tool", b"#!/bin/sh\necho hi\n")]),
        )
        .unwrap();

        let dest = dir.path().join("out");
        let extracted = extract(&archive_path, &dest, None, 1).unwrap();

        assert_eq!(extracted.len(), 1);
        assert!(dest.join("bin/tool").exists());
    }

    #[test]
    fn rejects_absolute_path_entries() {
        let dest = Path::new("/tmp/extract-root");
        assert!(matches!(
            resolve_entry_path(dest, Path::new("/etc/passwd")),
            Err(CoreError::ArchiveTraversal(_))
        ));
    }

    #[test]
    fn rejects_parent_dir_traversal() {
        let dest = Path::new("/tmp/extract-root");
        assert!(matches!(
            resolve_entry_path(dest, Path::new("../../etc/passwd")),
            Err(CoreError::ArchiveTraversal(_))
        ));
    }

    #[test]
    fn rejects_symlink_escaping_root() {
        let dest_dir = Path::new("/tmp/extract-root");
        let entry_path = dest_dir.join("bin/tool");
        assert!(validate_symlink_target(&entry_path, Path::new("../../../etc/passwd"), dest_dir).is_err());
    }

    #[test]
    fn allows_symlink_within_root() {
        let dest_dir = Path::new("/tmp/extract-root");
        let entry_path = dest_dir.join("bin/tool");
        assert!(validate_symlink_target(&entry_path, Path::new("../lib/tool.so"), dest_dir).is_ok());
    }

    #[test]
    fn strip_components_skips_shallow_entries() {
        assert_eq!(strip_components(Path::new("a/b/c"), 1), Some(PathBuf::from("b/c")));
        assert_eq!(strip_components(Path::new("a"), 1), None);
    }
}
