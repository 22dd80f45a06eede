//! Content hashing primitives.
//!
//! Every integrity-relevant structure in the core (ledger events, document
//! content, evidence-pack manifests) commits to a 256-bit BLAKE3 digest.
//! All hashing goes through [`ContentHash::digest`] so domain separation is
//! applied uniformly.

use serde::{Deserialize, Serialize};

/// A 256-bit BLAKE3 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hash `data` under a domain-separation prefix.
    pub fn digest(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain);
        hasher.update(data);
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in &self.0 {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let a = ContentHash::digest(b"test-v1:", b"payload");
        let b = ContentHash::digest(b"test-v1:", b"payload");
        assert_eq!(a, b);
    }

    #[test]
    fn domain_separation_changes_digest() {
        let a = ContentHash::digest(b"domain-a:", b"payload");
        let b = ContentHash::digest(b"domain-b:", b"payload");
        assert_ne!(a, b);
    }

    #[test]
    fn hex_is_64_chars() {
        let h = ContentHash::digest(b"test-v1:", b"x");
        assert_eq!(h.to_hex().len(), 64);
    }
}
