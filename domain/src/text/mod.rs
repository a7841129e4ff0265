//! Text primitives used by extraction, validation and clustering.
//!
//! All functions here are pure and deterministic: token maps are
//! `BTreeMap`s so iteration order never depends on hashing.

pub mod fingerprint;
pub mod similarity;
pub mod tokenize;

pub use fingerprint::fingerprint;
pub use similarity::{TfIdfModel, cosine_similarity, overlap_similarity};
pub use tokenize::{
    TokenCounts, contains_negation, evidence_tokens, is_stopword, split_sentences, token_counts,
    word_tokens,
};
