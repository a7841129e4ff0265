//! Deterministic fact extraction
//!
//! Sentences are scored by keyword density within their own provider's
//! answer, a bonus for numbers and proper nouns, and a positional bonus that
//! decays as facts accumulate. Providers are visited round-robin in id order
//! so a verbose provider cannot crowd out the others.

use std::collections::BTreeMap;

use super::fact::ExtractedFact;
use crate::core::provider::ProviderId;
use crate::core::score::unit_score;
use crate::core::string::{normalize_whitespace, truncate_chars};
use crate::dispatch::ProviderResponse;
use crate::text::{is_stopword, split_sentences, word_tokens};

/// Maximum facts extracted per request
pub const MAX_FACTS: usize = 10;

/// Maximum characters kept per fact
pub const MAX_FACT_CHARS: usize = 500;

/// Sentences with fewer word tokens are treated as fragments
const MIN_SENTENCE_WORDS: usize = 3;

const BASE_CONFIDENCE: f64 = 0.5;
const DENSITY_WEIGHT: f64 = 0.3;
const PATTERN_WEIGHT: f64 = 0.05;
const POSITION_WEIGHT: f64 = 0.1;

/// Extracts a bounded list of facts from provider outputs
#[derive(Debug, Clone)]
pub struct FactExtractor {
    max_facts: usize,
    max_chars: usize,
}

impl Default for FactExtractor {
    fn default() -> Self {
        Self {
            max_facts: MAX_FACTS,
            max_chars: MAX_FACT_CHARS,
        }
    }
}

impl FactExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower the fact budget (never above [`MAX_FACTS`])
    pub fn with_max_facts(mut self, max_facts: usize) -> Self {
        self.max_facts = max_facts.min(MAX_FACTS);
        self
    }

    /// Extract facts from the successful responses of a dispatch
    pub fn extract_from_responses<'a, I>(&self, responses: I) -> Vec<ExtractedFact>
    where
        I: IntoIterator<Item = &'a ProviderResponse>,
    {
        let outputs: BTreeMap<ProviderId, String> = responses
            .into_iter()
            .filter(|r| r.is_success())
            .map(|r| (r.provider_id.clone(), r.text.clone()))
            .collect();
        self.extract(&outputs)
    }

    /// Extract facts from raw provider text, keyed by provider id.
    ///
    /// The map's ordering (lexical by id) determines visiting order, so equal
    /// input always yields equal output.
    pub fn extract(&self, outputs: &BTreeMap<ProviderId, String>) -> Vec<ExtractedFact> {
        if self.max_facts == 0 {
            return Vec::new();
        }

        let candidates: Vec<(&ProviderId, Vec<String>, KeywordTable)> = outputs
            .iter()
            .map(|(id, text)| {
                (
                    id,
                    candidate_sentences(text, self.max_chars),
                    KeywordTable::build(text),
                )
            })
            .filter(|(_, sentences, _)| !sentences.is_empty())
            .collect();

        let mut facts = Vec::new();
        let mut round = 0;

        'rounds: loop {
            let mut progressed = false;
            for (provider, sentences, keywords) in &candidates {
                let Some(sentence) = sentences.get(round) else {
                    continue;
                };
                progressed = true;

                let confidence = score_sentence(sentence, keywords, facts.len());
                facts.push(ExtractedFact::new(
                    sentence.clone(),
                    (*provider).clone(),
                    confidence,
                ));

                if facts.len() >= self.max_facts {
                    break 'rounds;
                }
            }
            if !progressed {
                break;
            }
            round += 1;
        }

        facts
    }
}

/// Sentences eligible as facts, normalized and truncated, in text order
fn candidate_sentences(text: &str, max_chars: usize) -> Vec<String> {
    split_sentences(text)
        .into_iter()
        .map(|s| truncate_chars(&normalize_whitespace(&s), max_chars))
        .filter(|s| word_tokens(s).len() >= MIN_SENTENCE_WORDS)
        .collect()
}

/// Keyword frequencies within one provider's answer
struct KeywordTable {
    frequencies: BTreeMap<String, usize>,
    total: usize,
}

impl KeywordTable {
    fn build(text: &str) -> Self {
        let mut frequencies = BTreeMap::new();
        let mut total = 0;
        for token in word_tokens(text).into_iter().filter(|t| !is_stopword(t)) {
            *frequencies.entry(token).or_insert(0) += 1;
            total += 1;
        }
        Self { frequencies, total }
    }

    /// Share of the answer's keyword mass covered by the sentence's keywords
    fn density(&self, sentence: &str) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let mut seen = std::collections::BTreeSet::new();
        let covered: usize = word_tokens(sentence)
            .into_iter()
            .filter(|t| !is_stopword(t))
            .filter(|t| seen.insert(t.clone()))
            .map(|t| self.frequencies.get(&t).copied().unwrap_or(0))
            .sum();
        covered as f64 / self.total as f64
    }
}

fn score_sentence(sentence: &str, keywords: &KeywordTable, collected: usize) -> f64 {
    let density = DENSITY_WEIGHT * keywords.density(sentence);
    let patterns = PATTERN_WEIGHT * pattern_matches(sentence) as f64;
    let positional = POSITION_WEIGHT * (1.0 / (1.0 + collected as f64));
    unit_score((BASE_CONFIDENCE + density + patterns + positional).min(1.0))
}

/// Count numeric tokens and proper nouns (capitalized words after the first)
fn pattern_matches(sentence: &str) -> usize {
    sentence
        .split_whitespace()
        .enumerate()
        .map(|(i, raw)| (i, raw.trim_matches(|c: char| !c.is_alphanumeric())))
        .filter(|(_, word)| !word.is_empty())
        .filter(|(i, word)| {
            let numeric = word.chars().any(|c| c.is_ascii_digit());
            let proper = *i > 0 && word.chars().next().is_some_and(|c| c.is_uppercase());
            numeric || proper
        })
        .count()
}
