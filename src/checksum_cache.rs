//! Process-lifetime content checksums for write-if-changed output.
//!
//! The manifest stage records the SHA-256 of every file it writes, keyed by
//! output path. A rebuild producing the same bytes finds a matching checksum
//! and skips the write, so downstream content-addressed caching sees no
//! change. Concurrent builds are safe as long as they never share an output
//! path.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::BuildError;

/// Thread-safe checksum cache keyed by output path.
#[derive(Debug, Clone, Default)]
pub struct ChecksumCache {
    inner: Arc<DashMap<PathBuf, String>>,
}

impl ChecksumCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hex SHA-256 of `content`.
    pub fn checksum(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, path: &Path) -> Option<String> {
        self.inner.get(path).map(|entry| entry.value().clone())
    }

    /// Whether `content` matches the last write recorded for `path`.
    pub fn is_current(&self, path: &Path, content: &str) -> bool {
        self.inner
            .get(path)
            .is_some_and(|entry| *entry.value() == Self::checksum(content))
    }

    /// Forget a path, forcing the next write through.
    pub fn invalidate(&self, path: &Path) -> Option<String> {
        self.inner.remove(path).map(|(_, checksum)| checksum)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Write `content` to `path` unless the cache says it is already there.
    ///
    /// Returns whether a write happened. The cache is only updated after the
    /// file has been persisted.
    pub fn write_if_changed(&self, path: &Path, content: &str) -> Result<bool, BuildError> {
        let next = Self::checksum(content);
        if self.inner.get(path).is_some_and(|entry| *entry.value() == next) {
            return Ok(false);
        }

        write_atomic(path, content)?;
        self.inner.insert(path.to_path_buf(), next);
        Ok(true)
    }
}

/// Write through a sibling temp file renamed into place, so readers see the
/// old file or the new one and never a prefix.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), BuildError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(content.as_bytes())?;
    file.persist(path).map_err(|err| BuildError::Io(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_stable_hex() {
        let a = ChecksumCache::checksum("{}");
        assert_eq!(a, ChecksumCache::checksum("{}"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, ChecksumCache::checksum("{ }"));
    }

    #[test]
    fn second_identical_write_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.json");
        let cache = ChecksumCache::new();

        assert!(cache.write_if_changed(&path, "one").unwrap());
        assert!(!cache.write_if_changed(&path, "one").unwrap());
        assert!(cache.is_current(&path, "one"));
        assert!(cache.write_if_changed(&path, "two").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn invalidate_forces_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let cache = ChecksumCache::new();

        cache.write_if_changed(&path, "same").unwrap();
        assert!(cache.invalidate(&path).is_some());
        assert!(cache.is_empty());
        assert!(cache.write_if_changed(&path, "same").unwrap());
    }

    #[test]
    fn clones_share_state_across_threads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.json");
        let cache = ChecksumCache::new();
        let worker = cache.clone();
        let worker_path = path.clone();

        std::thread::spawn(move || {
            worker.write_if_changed(&worker_path, "data").unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(cache.len(), 1);
        assert!(!cache.write_if_changed(&path, "data").unwrap());
    }
}
