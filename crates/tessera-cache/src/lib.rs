//! Content-addressed cache for rendered snippets.
//!
//! Expensive snippet backends (typeset graphics, external converters) are
//! deterministic functions of their input, so their output can be stored under
//! a hash of that input and reused across builds. This crate provides:
//!
//! - [`Cache`]: Factory for named cache buckets
//! - [`CacheBucket`]: Key-value store addressed by [`ContentKey`] digests
//! - [`CacheBucketExt`]: String and JSON helpers over raw bytes
//!
//! # Implementations
//!
//! - [`NullCache`]: No-op (always misses), used when caching is disabled
//! - [`MemoryCache`]: In-process map, shared across documents of one build
//! - [`FileCache`]: On-disk store with version validation
//!
//! # Example
//!
//! ```
//! use tessera_cache::{Cache, CacheBucketExt, ContentKey, MemoryCache};
//!
//! let cache = MemoryCache::new();
//! let bucket = cache.bucket("verbatim");
//! let key = ContentKey::new("tikz").part("\\draw (0,0) -- (1,1);").digest();
//!
//! bucket.set_string(&key, "<svg></svg>");
//! assert_eq!(bucket.get_string(&key).as_deref(), Some("<svg></svg>"));
//! ```

mod ext;
mod file;
mod key;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub use ext::CacheBucketExt;
pub use file::FileCache;
pub use key::ContentKey;

/// A named partition within a [`Cache`].
///
/// Keys are hex digests produced by [`ContentKey::digest`]. Because the key
/// already covers every input that affects the stored value, there is no
/// separate invalidation token: a changed input is simply a different key.
pub trait CacheBucket: Send + Sync {
    /// Retrieve a cached value, or `None` on miss.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store a value, overwriting any existing entry for the same key.
    ///
    /// Storage failures are logged and otherwise ignored: a cache that cannot
    /// be written degrades to a cache that always misses.
    fn set(&self, key: &str, value: &[u8]);
}

/// Factory for named cache [`CacheBucket`]s.
///
/// Buckets with different names never see each other's entries.
pub trait Cache: Send + Sync {
    /// Open or create a named bucket (e.g., "verbatim", "math").
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket>;
}

/// No-op [`CacheBucket`] that never stores or retrieves data.
pub struct NullCacheBucket;

impl CacheBucket for NullCacheBucket {
    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _value: &[u8]) {}
}

/// No-op [`Cache`] that always returns [`NullCacheBucket`]s.
pub struct NullCache;

impl Cache for NullCache {
    fn bucket(&self, _name: &str) -> Box<dyn CacheBucket> {
        Box::new(NullCacheBucket)
    }
}

type Entries = Arc<Mutex<HashMap<(String, String), Vec<u8>>>>;

/// In-process [`Cache`] backed by a shared map.
///
/// Cloning the cache (or opening the same bucket twice) shares the entries,
/// so one instance can serve every document of a multi-file build.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Entries,
}

impl MemoryCache {
    /// Create an empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket> {
        Box::new(MemoryCacheBucket {
            name: name.to_owned(),
            entries: Arc::clone(&self.entries),
        })
    }
}

struct MemoryCacheBucket {
    name: String,
    entries: Entries,
}

impl CacheBucket for MemoryCacheBucket {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let entries = self.entries.lock().ok()?;
        entries.get(&(self.name.clone(), key.to_owned())).cloned()
    }

    fn set(&self, key: &str, value: &[u8]) {
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert((self.name.clone(), key.to_owned()), value.to_vec());
            }
            Err(e) => tracing::warn!(bucket = %self.name, error = %e, "Memory cache poisoned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_cache_always_misses() {
        let bucket = NullCache.bucket("verbatim");

        assert_eq!(bucket.get("abc"), None);
        bucket.set("abc", b"hello");
        assert_eq!(bucket.get("abc"), None);
    }

    #[test]
    fn test_memory_cache_round_trip() {
        let cache = MemoryCache::new();
        let bucket = cache.bucket("verbatim");

        bucket.set("abc", b"<svg/>");
        assert_eq!(bucket.get("abc"), Some(b"<svg/>".to_vec()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_memory_cache_buckets_are_isolated() {
        let cache = MemoryCache::new();
        let verbatim = cache.bucket("verbatim");
        let math = cache.bucket("math");

        verbatim.set("k", b"v");
        assert_eq!(math.get("k"), None);
    }

    #[test]
    fn test_memory_cache_clones_share_entries() {
        let cache = MemoryCache::new();
        let other = cache.clone();

        cache.bucket("verbatim").set("k", b"v");
        assert_eq!(other.bucket("verbatim").get("k"), Some(b"v".to_vec()));
    }
}
