//! Fact-versus-evidence classification
//!
//! Each page is split into sentences; a fact is compared against every
//! sentence of every usable page and the best match decides the verdict.
//! Negation is only looked for in that best-matching sentence.

use std::collections::BTreeMap;

use super::entities::{FactCheck, ValidationResult, Verdict, WebDocument};
use crate::core::score::unit_score;
use crate::extraction::ExtractedFact;
use crate::text::{
    TokenCounts, contains_negation, evidence_tokens, overlap_similarity, split_sentences,
    token_counts,
};

const SUPPORT_THRESHOLD: f64 = 0.25;
const CONTRADICTION_THRESHOLD: f64 = 0.20;
const UNKNOWN_CONFIDENCE: f64 = 0.35;

/// Classifies extracted facts against retrieved pages
#[derive(Debug, Clone)]
pub struct EvidenceValidator {
    support_threshold: f64,
    contradiction_threshold: f64,
}

impl Default for EvidenceValidator {
    fn default() -> Self {
        Self {
            support_threshold: SUPPORT_THRESHOLD,
            contradiction_threshold: CONTRADICTION_THRESHOLD,
        }
    }
}

/// Best-matching evidence for a single fact
struct EvidenceMatch<'a> {
    url: &'a str,
    similarity: f64,
    negated: bool,
}

struct IndexedSentence {
    counts: TokenCounts,
    negated: bool,
}

struct IndexedPage<'a> {
    url: &'a str,
    sentences: Vec<IndexedSentence>,
}

impl EvidenceValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify every fact against the usable pages.
    pub fn validate(&self, facts: &[ExtractedFact], pages: &[WebDocument]) -> ValidationResult {
        let usable: Vec<&WebDocument> = pages.iter().filter(|p| p.is_usable()).collect();
        let index: Vec<IndexedPage<'_>> = usable.iter().map(|p| index_page(p)).collect();

        let mut result = ValidationResult {
            web_evidence: usable
                .iter()
                .map(|p| (p.url.clone(), p.content.clone()))
                .collect::<BTreeMap<_, _>>(),
            ..ValidationResult::default()
        };

        for fact in facts {
            let check = self.check_fact(fact, &index);
            match check.verdict {
                Verdict::Supported => result.supported.push(check),
                Verdict::Contradicted => result.contradicted.push(check),
                Verdict::Unknown => result.unknown.push(check),
            }
        }

        result.confidence = aggregate_confidence(
            result.supported.len(),
            result.contradicted.len(),
            facts.len(),
        );
        result
    }

    fn check_fact(&self, fact: &ExtractedFact, index: &[IndexedPage<'_>]) -> FactCheck {
        let fact_counts = token_counts(evidence_tokens(&fact.text));
        let best = best_match(&fact_counts, index);

        let (verdict, confidence, evidence_url, similarity) = match best {
            Some(m) if m.similarity >= self.support_threshold && !m.negated => (
                Verdict::Supported,
                (0.6 + 0.4 * m.similarity).min(1.0),
                Some(m.url.to_string()),
                m.similarity,
            ),
            Some(m) if m.similarity >= self.contradiction_threshold && m.negated => (
                Verdict::Contradicted,
                (0.5 + 0.5 * m.similarity).min(1.0),
                Some(m.url.to_string()),
                m.similarity,
            ),
            Some(m) => (Verdict::Unknown, UNKNOWN_CONFIDENCE, None, m.similarity),
            None => (Verdict::Unknown, UNKNOWN_CONFIDENCE, None, 0.0),
        };

        FactCheck {
            fact: fact.clone(),
            verdict,
            evidence_url,
            confidence: unit_score(confidence),
            similarity: unit_score(similarity),
        }
    }
}

/// `min(1, (0.6 * supported + 0.4 * contradicted) / max(1, total))`
pub fn aggregate_confidence(supported: usize, contradicted: usize, total: usize) -> f64 {
    let weighted = 0.6 * supported as f64 + 0.4 * contradicted as f64;
    unit_score((weighted / total.max(1) as f64).min(1.0))
}

fn index_page(page: &WebDocument) -> IndexedPage<'_> {
    let sentences = split_sentences(&page.content)
        .into_iter()
        .map(|s| IndexedSentence {
            counts: token_counts(evidence_tokens(&s)),
            negated: contains_negation(&s),
        })
        .filter(|s| !s.counts.is_empty())
        .collect();
    IndexedPage {
        url: &page.url,
        sentences,
    }
}

/// Highest-similarity sentence across all pages; earlier pages win ties.
fn best_match<'a>(fact: &TokenCounts, index: &'a [IndexedPage<'a>]) -> Option<EvidenceMatch<'a>> {
    if fact.is_empty() {
        return None;
    }
    let mut best: Option<EvidenceMatch<'a>> = None;
    for page in index {
        for sentence in &page.sentences {
            let (similarity, shared) = overlap_similarity(fact, &sentence.counts);
            if shared == 0 {
                continue;
            }
            let better = best
                .as_ref()
                .is_none_or(|current| similarity > current.similarity);
            if better {
                best = Some(EvidenceMatch {
                    url: page.url,
                    similarity,
                    negated: sentence.negated,
                });
            }
        }
    }
    best
}
