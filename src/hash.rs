// src/hash.rs

//! Hashing for recipe fingerprints and canonical spec hashes
//!
//! Both are SHA-256 rendered as lowercase hex. Canonical hashes are built
//! from length-prefixed fields so that no two field sequences collide by
//! concatenation.

use sha2::{Digest, Sha256};

/// Length of the hash shown in prefix directory names and listings
pub const SHORT_HASH_LEN: usize = 7;

/// SHA-256 of a byte slice as hex
pub fn sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Abbreviate a hash for display
pub fn short(hash: &str) -> &str {
    &hash[..hash.len().min(SHORT_HASH_LEN)]
}

/// Incremental hasher over named fields
pub struct FieldHasher {
    inner: Sha256,
}

impl FieldHasher {
    /// Start a new hash
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Feed one `key = value` field
    pub fn field(&mut self, key: &str, value: &str) -> &mut Self {
        for part in [key, value] {
            self.inner.update((part.len() as u64).to_le_bytes());
            self.inner.update(part.as_bytes());
        }
        self
    }

    /// Finish and return hex
    pub fn finish(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

impl Default for FieldHasher {
    fn default() -> Self {
        Self::new()
    }
}
