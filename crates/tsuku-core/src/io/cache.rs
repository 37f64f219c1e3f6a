//! Download cache (C4).
//!
//! Grounded on the teacher's content-addressed `cas/<hash>` layout in
//! `io/artifacts.rs`, ported from S3/R2 (out of scope — see
//! `SPEC_FULL.md` §0) to a local-disk cache keyed the same way.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Content-addressed file cache keyed by verified checksum.
///
/// Presence is purely a fast path: a missing or stale cache entry never
/// blocks an install, it just means the file is re-downloaded.
#[derive(Debug, Clone)]
pub struct DownloadCache {
    root: PathBuf,
}

impl DownloadCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, checksum: &str) -> PathBuf {
        self.root.join(checksum)
    }

    /// Returns the cached path if a file exists under `checksum` and
    /// re-hashes to it. A mismatch silently evicts the stale entry.
    pub async fn load(&self, checksum: &str) -> Option<PathBuf> {
        let path = self.entry_path(checksum);
        let bytes = tokio::fs::read(&path).await.ok()?;
        let actual = hex::encode(Sha256::digest(&bytes));
        if actual == checksum {
            Some(path)
        } else {
            let _ = tokio::fs::remove_file(&path).await;
            None
        }
    }

    /// Moves a verified download into the cache under its checksum.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the cache directory cannot be created or the
    /// move fails.
    pub async fn save(&self, verified_path: &Path, checksum: &str) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;
        let dest = self.entry_path(checksum);
        if tokio::fs::rename(verified_path, &dest).await.is_err() {
            // Cross-device fallback: copy then remove the source.
            tokio::fs::copy(verified_path, &dest).await?;
            tokio::fs::remove_file(verified_path).await?;
        }
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DownloadCache::new(dir.path().join("cas"));

        let src = dir.path().join("download.part");
        tokio::fs::write(&src, b"hello world").await.unwrap();
        let checksum = hex::encode(Sha256::digest(b"hello world"));

        let stored = cache.save(&src, &checksum).await.unwrap();
        assert!(stored.exists());

        let loaded = cache.load(&checksum).await.unwrap();
        assert_eq!(loaded, stored);
    }

    #[tokio::test]
    async fn load_evicts_on_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DownloadCache::new(dir.path().join("cas"));
        tokio::fs::create_dir_all(dir.path().join("cas")).await.unwrap();

        let bogus_checksum = "f".repeat(64);
        let path = dir.path().join("cas").join(&bogus_checksum);
        tokio::fs::write(&path, b"tampered").await.unwrap();

        assert!(cache.load(&bogus_checksum).await.is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn load_returns_none_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DownloadCache::new(dir.path().join("cas"));
        assert!(cache.load(&"a".repeat(64)).await.is_none());
    }
}
