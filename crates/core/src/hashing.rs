//! SHA-256 content hashing.
//!
//! Diff payloads record the digest of the text they were computed against,
//! so conflicts are detected by content rather than by revision number.

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const HASH_HEX_LEN: usize = 64;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Content hash of a song body as stored in diff payloads.
pub fn text_hash(text: &str) -> String {
    sha256_hex(text.as_bytes())
}

/// Returns `true` if `value` looks like a lowercase hex SHA-256 digest.
pub fn is_hash(value: &str) -> bool {
    value.len() == HASH_HEX_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        assert_eq!(
            text_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn text_hash_is_byte_sensitive() {
        assert_ne!(text_hash("ABC"), text_hash("ABC\n"));
        assert_eq!(text_hash("ABC").len(), HASH_HEX_LEN);
    }

    #[test]
    fn is_hash_accepts_digests_only() {
        assert!(is_hash(&text_hash("chorus")));
        assert!(!is_hash("abc"));
        assert!(!is_hash(&"G".repeat(HASH_HEX_LEN)));
    }
}
