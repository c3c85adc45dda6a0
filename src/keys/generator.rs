//! API key generation and hashing
//!
//! Keys are `mt_` followed by 64 hex characters of CSPRNG output. Only the
//! SHA-256 hash of the full plaintext is ever stored; hash comparisons use
//! constant-time equality so lookup cost leaks nothing about partial
//! matches.

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::utils::truncate_str;

/// Literal prefix every platform key starts with
pub const KEY_PREFIX: &str = "mt_";

/// Display prefix length: the literal plus the first 8 secret characters
pub const DISPLAY_PREFIX_LEN: usize = KEY_PREFIX.len() + 8;

const SECRET_BYTES: usize = 32;

/// Result of minting a new key. The plaintext is shown to the owner once
/// and never persisted.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    pub plaintext: String,
    pub prefix: String,
    pub hash: String,
}

/// Mint a fresh API key
pub fn generate() -> GeneratedKey {
    let mut secret = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut secret);

    let plaintext = format!("{}{}", KEY_PREFIX, hex::encode(secret));
    let prefix = display_prefix(&plaintext);
    let hash = hash_key(&plaintext);

    GeneratedKey {
        plaintext,
        prefix,
        hash,
    }
}

/// Hex SHA-256 of the full plaintext key
pub fn hash_key(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time equality over two stored/candidate hashes
pub fn hashes_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// The display-safe head of a plaintext key
pub fn display_prefix(plaintext: &str) -> String {
    truncate_str(plaintext, DISPLAY_PREFIX_LEN).to_string()
}

/// Whether a candidate credential has the platform's key shape
pub fn has_key_format(candidate: &str) -> bool {
    candidate.starts_with(KEY_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shape() {
        let generated = generate();
        assert!(generated.plaintext.starts_with(KEY_PREFIX));
        assert_eq!(generated.plaintext.len(), KEY_PREFIX.len() + 64);
        assert_eq!(generated.prefix.len(), DISPLAY_PREFIX_LEN);
        assert!(generated.plaintext.starts_with(&generated.prefix));
        assert_eq!(generated.hash.len(), 64);
    }

    #[test]
    fn test_generate_unique() {
        let a = generate();
        let b = generate();
        assert_ne!(a.plaintext, b.plaintext);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_hash_deterministic() {
        let key = "mt_0123456789abcdef";
        assert_eq!(hash_key(key), hash_key(key));
        assert_ne!(hash_key(key), hash_key("mt_0123456789abcdee"));
    }

    #[test]
    fn test_hashes_match() {
        let hash = hash_key("mt_sample");
        assert!(hashes_match(&hash, &hash));
        assert!(!hashes_match(&hash, &hash_key("mt_other")));
        assert!(!hashes_match(&hash, "short"));
    }

    #[test]
    fn test_key_format() {
        assert!(has_key_format("mt_abc123"));
        assert!(!has_key_format("sk_abc123"));
        assert!(!has_key_format(""));
    }
}
