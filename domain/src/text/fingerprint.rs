//! Near-duplicate fingerprints for clustering provider outputs

use sha2::{Digest, Sha256};

use super::tokenize::word_tokens;

/// Fragments dropped before hashing so trivially rephrased answers collide
const STOP_FRAGMENTS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "of", "to", "in", "and", "that", "it", "this",
    "answer", "indeed", "well", "so",
];

/// Number of hex characters kept from the digest
const FINGERPRINT_LEN: usize = 16;

/// Normalized-text fingerprint: lowercase, punctuation stripped, stop
/// fragments removed, whitespace collapsed, then hashed.
pub fn fingerprint(text: &str) -> String {
    let normalized = normalize_for_fingerprint(text);
    let digest = Sha256::digest(normalized.as_bytes());
    let mut fingerprint = hex::encode(digest);
    fingerprint.truncate(FINGERPRINT_LEN);
    fingerprint
}

pub fn normalize_for_fingerprint(text: &str) -> String {
    word_tokens(text)
        .into_iter()
        .filter(|t| !STOP_FRAGMENTS.contains(&t.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}
