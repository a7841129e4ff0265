//! Tokenization and sentence splitting

use std::collections::BTreeMap;

/// Token multiset
pub type TokenCounts = BTreeMap<String, usize>;

/// Minimum token length (in characters) considered as evidence
const MIN_EVIDENCE_TOKEN_LEN: usize = 3;

/// Small stopword set applied to keyword-density scoring
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "for", "from", "has", "have",
    "in", "is", "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "which",
    "with",
];

/// Negation markers that flip agreement into contradiction
const NEGATION_MARKERS: &[&str] = &["not", "no", "never", "none"];

/// Lowercased alphanumeric word tokens
pub fn word_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Lowercased alphanumeric tokens of at least three characters
pub fn evidence_tokens(text: &str) -> Vec<String> {
    word_tokens(text)
        .into_iter()
        .filter(|t| t.chars().count() >= MIN_EVIDENCE_TOKEN_LEN)
        .collect()
}

pub fn token_counts<I, S>(tokens: I) -> TokenCounts
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut counts = TokenCounts::new();
    for token in tokens {
        *counts.entry(token.into()).or_insert(0) += 1;
    }
    counts
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Whether the text contains a standalone negation marker (case-insensitive)
pub fn contains_negation(text: &str) -> bool {
    word_tokens(text)
        .iter()
        .any(|t| NEGATION_MARKERS.contains(&t.as_str()))
}

/// Split text into trimmed sentences.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace (or the end of
/// input), or at a line break. Decimal points such as `3.14` do not split.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\n' || ch == '\r' {
            push_sentence(&mut sentences, &mut current);
            continue;
        }
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let boundary = match chars.peek() {
                None => true,
                Some(next) => next.is_whitespace(),
            };
            if boundary {
                push_sentence(&mut sentences, &mut current);
            }
        }
    }
    push_sentence(&mut sentences, &mut current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}
