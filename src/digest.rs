//! Content identity for deduplication.
//!
//! Two imports are the same document iff they share both the raw text and the
//! analysis dictionary: a different dictionary produces a different token
//! tree, so the dictionary id is folded into the digest.

use sha2::{Digest, Sha256};

use serde::{Deserialize, Serialize};

/// Deterministic fixed-length identity of a (content, dictionary) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the digest: SHA-256 over `"{content}|{dictionary}"`, hex-encoded.
    pub fn compute(content: &str, dictionary: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hasher.update(b"|");
        hasher.update(dictionary.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let a = ContentDigest::compute("花の色は", "unidic-chuko");
        let b = ContentDigest::compute("花の色は", "unidic-chuko");
        assert_eq!(a, b);
    }

    #[test]
    fn digest_is_fixed_length_hex() {
        let d = ContentDigest::compute("x", "unidic-chuko");
        assert_eq!(d.as_str().len(), 64);
        assert!(d.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn dictionary_changes_the_digest() {
        let a = ContentDigest::compute("花の色は", "unidic-chuko");
        let b = ContentDigest::compute("花の色は", "unidic-waka");
        assert_ne!(a, b);
    }

    #[test]
    fn content_changes_the_digest() {
        let a = ContentDigest::compute("花の色は", "unidic-chuko");
        let b = ContentDigest::compute("花の色は移りにけりな", "unidic-chuko");
        assert_ne!(a, b);
    }
}
