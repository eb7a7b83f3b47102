//! Content hashing for the analysis cache.
//!
//! The digest covers the exact analyzed text. No normalization is applied, so
//! a cache hit guarantees the input bytes did not change.

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const CONTENT_HASH_LEN: usize = 64;

/// Compute the lowercase hex SHA-256 digest of `content`.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check whether `value` looks like a digest produced by [`content_hash`].
pub fn is_content_hash(value: &str) -> bool {
    value.len() == CONTENT_HASH_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_single_char_change_changes_hash() {
        let a = content_hash("Alice meets Bob at the Tower.");
        let b = content_hash("Alice meets Bob at the Tower!");
        assert_ne!(a, b);
    }

    #[test]
    fn test_no_whitespace_normalization() {
        assert_ne!(content_hash("story"), content_hash("story "));
        assert_ne!(content_hash("Story"), content_hash("story"));
        assert_ne!(content_hash("a\nb"), content_hash("a\r\nb"));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(content_hash("same"), content_hash("same"));
    }

    #[test]
    fn test_is_content_hash() {
        assert!(is_content_hash(&content_hash("x")));
        assert!(!is_content_hash("abc"));
        assert!(!is_content_hash(&"Z".repeat(CONTENT_HASH_LEN)));
    }
}
