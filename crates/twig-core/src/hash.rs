//! SHA-256 content digests.
//!
//! Every blob and commit in twig is keyed by the lowercase hex SHA-256 of
//! its exact bytes.

use sha2::{Digest, Sha256};

/// Length of a full hex digest.
pub const DIGEST_LEN: usize = 64;

/// Shortest prefix accepted when resolving a commit id.
pub const MIN_PREFIX_LEN: usize = 4;

/// Digest arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// True if `s` is non-empty lowercase hex no longer than a full digest.
pub fn is_hex_prefix(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= DIGEST_LEN
        && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// True if `s` is a complete digest.
pub fn is_full_digest(s: &str) -> bool {
    s.len() == DIGEST_LEN && is_hex_prefix(s)
}
