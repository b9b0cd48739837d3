//! Fingerprints of canonical argument sets
//!
//! A fingerprint is the tail of a SHA256 digest over the rendered argument set.
//! It only narrows the lookup to one file; the stored arguments are compared
//! again before a result is reused.

use crate::cache::canonical::CanonicalArgs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of hex characters kept from the digest
pub const FINGERPRINT_LEN: usize = 16;

/// Fixed-length hex cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Accept an existing key, e.g. one parsed back from a file name
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() == FINGERPRINT_LEN && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(s.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash the rendered argument set, returning the last 16 hex chars
pub fn fingerprint(args: &CanonicalArgs) -> CacheKey {
    fingerprint_text(&args.render())
}

fn fingerprint_text(text: &str) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hex::encode(hasher.finalize());

    CacheKey(digest[digest.len() - FINGERPRINT_LEN..].to_string())
}
