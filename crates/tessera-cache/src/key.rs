//! Cache key computation.

use sha2::{Digest, Sha256};

/// Builder for content-based cache keys.
///
/// Every input that affects a rendered result (backend name, attributes,
/// inner text, backend version) is fed in as a separate part. Parts are
/// length-prefixed before hashing, so `("ab", "c")` and `("a", "bc")` never
/// produce the same key.
#[derive(Debug)]
pub struct ContentKey {
    hasher: Sha256,
}

impl ContentKey {
    /// Start a key within a namespace (usually the backend or environment name).
    #[must_use]
    pub fn new(namespace: &str) -> Self {
        Self {
            hasher: Sha256::new(),
        }
        .part(namespace)
    }

    /// Add one input to the key.
    #[must_use]
    pub fn part(mut self, value: &str) -> Self {
        self.hasher.update((value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    /// Finish the key as 64 lowercase hex characters (SHA-256).
    #[must_use]
    pub fn digest(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}
