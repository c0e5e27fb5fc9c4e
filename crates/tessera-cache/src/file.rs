//! File-based cache implementation.
//!
//! [`FileCache`] stores each entry as a plain file. Keys are content digests,
//! so entries are fanned out by their first two characters to keep directory
//! sizes bounded:
//!
//! ```text
//! {root}/
//! +-- VERSION              # cache format/backend version
//! +-- verbatim/            # bucket "verbatim"
//!     +-- 3f/
//!         +-- 3fa1...      # entry (raw bytes)
//! ```
//!
//! On construction the `VERSION` file is compared with the expected version;
//! on mismatch the whole directory is wiped so output produced by an older
//! backend is never reused.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{Cache, CacheBucket};

/// File-based [`Cache`] rooted at a directory on disk.
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Open a cache at `root`, wiping it when its version differs from `version`.
    ///
    /// Failures while validating are logged, never fatal.
    #[must_use]
    pub fn new(root: PathBuf, version: &str) -> Self {
        validate_version(&root, version);
        Self { root }
    }

    /// Root directory of the cache.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Cache for FileCache {
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket> {
        Box::new(FileCacheBucket {
            dir: self.root.join(name),
        })
    }
}

struct FileCacheBucket {
    dir: PathBuf,
}

impl FileCacheBucket {
    /// Path for a key, or `None` when the key could escape the bucket directory.
    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        let valid = key.len() >= 2
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            tracing::debug!(key, "Rejected cache key");
            return None;
        }
        Some(self.dir.join(&key[..2]).join(key))
    }
}

impl CacheBucket for FileCacheBucket {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        fs::read(self.entry_path(key)?).ok()
    }

    fn set(&self, key: &str, value: &[u8]) {
        let Some(path) = self.entry_path(key) else {
            return;
        };
        let Some(parent) = path.parent() else {
            return;
        };
        if let Err(e) = fs::create_dir_all(parent) {
            tracing::warn!(dir = %parent.display(), error = %e, "Failed to create cache directory");
            return;
        }

        // Write then rename so concurrent readers never see a partial entry.
        let tmp = path.with_extension("tmp");
        let result = fs::write(&tmp, value).and_then(|()| fs::rename(&tmp, &path));
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write cache entry");
            let _ = fs::remove_file(&tmp);
        }
    }
}

/// Validate the cache version, wiping the directory on mismatch.
fn validate_version(root: &Path, version: &str) {
    let version_file = root.join("VERSION");

    match fs::read_to_string(&version_file) {
        Ok(stored) if stored == version => {
            tracing::debug!(version, "Cache version matches");
            return;
        }
        Ok(stored) => {
            tracing::info!(
                stored = %stored,
                current = version,
                "Cache version mismatch, wiping cache"
            );
        }
        Err(_) => {
            tracing::info!(root = %root.display(), "No cache VERSION file found, initializing cache");
        }
    }

    if root.exists()
        && let Err(e) = fs::remove_dir_all(root)
    {
        tracing::warn!(error = %e, "Failed to remove cache directory");
    }
    if let Err(e) = fs::create_dir_all(root) {
        tracing::warn!(error = %e, "Failed to create cache directory");
        return;
    }
    if let Err(e) = fs::write(&version_file, version) {
        tracing::warn!(error = %e, "Failed to write cache VERSION file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContentKey;
    use tempfile::TempDir;

    fn key(text: &str) -> String {
        ContentKey::new("test").part(text).digest()
    }

    #[test]
    fn test_file_bucket_set_and_get() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let bucket = cache.bucket("verbatim");
        let k = key("a");

        bucket.set(&k, b"<svg>a</svg>");
        assert_eq!(bucket.get(&k), Some(b"<svg>a</svg>".to_vec()));
    }

    #[test]
    fn test_entries_are_fanned_out_by_prefix() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");
        let cache = FileCache::new(root.clone(), "v1");
        let k = key("fan-out");

        cache.bucket("verbatim").set(&k, b"x");
        assert!(root.join("verbatim").join(&k[..2]).join(&k).exists());
    }

    #[test]
    fn test_missing_key_misses() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        assert_eq!(cache.bucket("verbatim").get(&key("nope")), None);
    }

    #[test]
    fn test_path_like_keys_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let bucket = cache.bucket("verbatim");

        bucket.set("../escape", b"x");
        assert_eq!(bucket.get("../escape"), None);
        assert!(!tmp.path().join("escape").exists());
    }

    #[test]
    fn test_buckets_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let k = key("shared");

        cache.bucket("alpha").set(&k, b"alpha");
        cache.bucket("beta").set(&k, b"beta");

        assert_eq!(cache.bucket("alpha").get(&k), Some(b"alpha".to_vec()));
        assert_eq!(cache.bucket("beta").get(&k), Some(b"beta".to_vec()));
    }

    #[test]
    fn test_version_match_keeps_entries() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");
        let k = key("kept");

        FileCache::new(root.clone(), "v1").bucket("verbatim").set(&k, b"kept");

        let reopened = FileCache::new(root, "v1");
        assert_eq!(reopened.bucket("verbatim").get(&k), Some(b"kept".to_vec()));
    }

    #[test]
    fn test_version_mismatch_wipes_entries() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");
        let k = key("wiped");

        FileCache::new(root.clone(), "v1").bucket("verbatim").set(&k, b"old");

        let reopened = FileCache::new(root.clone(), "v2");
        assert_eq!(reopened.bucket("verbatim").get(&k), None);
        assert_eq!(fs::read_to_string(root.join("VERSION")).unwrap(), "v2");
    }

    #[test]
    fn test_nonexistent_root_is_created() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("deeply/nested/cache");

        let cache = FileCache::new(root.clone(), "v1");
        assert_eq!(cache.root(), root.as_path());
        assert_eq!(fs::read_to_string(root.join("VERSION")).unwrap(), "v1");
    }
}
