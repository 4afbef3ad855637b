//! Content-addressed cache keys.

use std::fmt;

use sha2::{Digest, Sha256};

/// SHA-256 fingerprint of a `(prompt, data)` pair, rendered as 64 lowercase
/// hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `prompt_text` followed by `data_text`.
    ///
    /// Each input is prefixed with its length as a little-endian `u64`, so
    /// bytes cannot migrate across the boundary (`("ab", "c")` and
    /// `("a", "bc")` hash differently).
    pub fn derive(prompt_text: &str, data_text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((prompt_text.len() as u64).to_le_bytes());
        hasher.update(prompt_text.as_bytes());
        hasher.update((data_text.len() as u64).to_le_bytes());
        hasher.update(data_text.as_bytes());
        let digest = hasher.finalize();
        Self(hex::encode(&digest[..]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex chars, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
