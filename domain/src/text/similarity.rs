//! Similarity measures over token multisets

use std::collections::BTreeMap;

use super::tokenize::{TokenCounts, token_counts, word_tokens};

/// Bonus added per unique token shared between a fact and its evidence
const SHARED_TOKEN_BONUS: f64 = 0.02;

/// Cosine similarity between two token multisets
pub fn cosine_similarity(a: &TokenCounts, b: &TokenCounts) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .filter_map(|(token, &count)| b.get(token).map(|&other| (count * other) as f64))
        .sum();
    let norm_a = a.values().map(|&c| (c * c) as f64).sum::<f64>().sqrt();
    let norm_b = b.values().map(|&c| (c * c) as f64).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Cosine similarity plus a small bonus per shared unique token, capped at 1.
///
/// Returns the score and the number of shared unique tokens.
pub fn overlap_similarity(fact: &TokenCounts, evidence: &TokenCounts) -> (f64, usize) {
    let shared = fact.keys().filter(|t| evidence.contains_key(*t)).count();
    if shared == 0 {
        return (0.0, 0);
    }
    let score = cosine_similarity(fact, evidence) + SHARED_TOKEN_BONUS * shared as f64;
    (score.min(1.0), shared)
}

/// Lightweight TF-IDF model fitted on a small document set.
///
/// Uses smoothed idf `ln((1 + n) / (1 + df)) + 1` so terms present in every
/// document still carry weight.
#[derive(Debug, Clone)]
pub struct TfIdfModel {
    vectors: Vec<BTreeMap<String, f64>>,
}

impl TfIdfModel {
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Self {
        let counts: Vec<TokenCounts> = documents
            .iter()
            .map(|d| token_counts(word_tokens(d.as_ref())))
            .collect();

        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for doc in &counts {
            for token in doc.keys() {
                *document_frequency.entry(token.as_str()).or_insert(0) += 1;
            }
        }

        let n = counts.len() as f64;
        let vectors = counts
            .iter()
            .map(|doc| {
                let total: usize = doc.values().sum();
                doc.iter()
                    .map(|(token, &count)| {
                        let tf = count as f64 / total.max(1) as f64;
                        let df = document_frequency.get(token.as_str()).copied().unwrap_or(0);
                        let idf = ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0;
                        (token.clone(), tf * idf)
                    })
                    .collect()
            })
            .collect();

        Self { vectors }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Cosine similarity between documents `i` and `j` (0 when out of range)
    pub fn similarity(&self, i: usize, j: usize) -> f64 {
        let (Some(a), Some(b)) = (self.vectors.get(i), self.vectors.get(j)) else {
            return 0.0;
        };
        let dot: f64 = a
            .iter()
            .filter_map(|(token, w)| b.get(token).map(|v| w * v))
            .sum();
        let norm_a = a.values().map(|w| w * w).sum::<f64>().sqrt();
        let norm_b = b.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}
