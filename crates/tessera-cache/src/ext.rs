//! Typed helpers for [`CacheBucket`].

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CacheBucket;

/// String and JSON convenience methods for any [`CacheBucket`].
///
/// Kept as an extension trait so [`CacheBucket`] stays object-safe and
/// implementors only deal in bytes.
pub trait CacheBucketExt: CacheBucket {
    /// Retrieve a JSON-deserialized value. Deserialization failures count as a miss.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key)?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Store a value as JSON. Serialization failures are ignored.
    fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        if let Ok(bytes) = serde_json::to_vec(value) {
            self.set(key, &bytes);
        }
    }

    /// Retrieve a cached UTF-8 string. Invalid UTF-8 counts as a miss.
    fn get_string(&self, key: &str) -> Option<String> {
        let bytes = self.get(key)?;
        String::from_utf8(bytes).ok()
    }

    /// Store a string value.
    fn set_string(&self, key: &str, value: &str) {
        self.set(key, value.as_bytes());
    }
}

impl<B: CacheBucket + ?Sized> CacheBucketExt for B {}
