//! Validation value objects

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::provider::ProviderId;
use crate::core::string::{normalize_whitespace, truncate_chars};
use crate::extraction::ExtractedFact;

/// Maximum characters of page content retained
pub const MAX_PAGE_CHARS: usize = 60_000;

/// Outcome of retrieving one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Success,
    Error,
}

/// A retrieved web document (search hit or scraped page)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebDocument {
    pub url: String,
    /// Whitespace-normalized text, at most 60,000 characters
    pub content: String,
    pub status: PageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebDocument {
    /// A successfully retrieved page; content is normalized and truncated.
    pub fn success(url: impl Into<String>, content: &str) -> Self {
        Self {
            url: url.into(),
            content: truncate_chars(&normalize_whitespace(content), MAX_PAGE_CHARS),
            status: PageStatus::Success,
            title: None,
            error: None,
        }
    }

    /// A page that could not be retrieved.
    pub fn error(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: String::new(),
            status: PageStatus::Error,
            title: None,
            error: Some(reason.into()),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = normalize_whitespace(&title.into());
        self.title = if title.is_empty() { None } else { Some(title) };
        self
    }

    /// Only successful pages with content count as evidence.
    pub fn is_usable(&self) -> bool {
        self.status == PageStatus::Success && !self.content.is_empty()
    }
}

/// Classification of a fact against web evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Supported,
    Contradicted,
    Unknown,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Supported => write!(f, "supported"),
            Verdict::Contradicted => write!(f, "contradicted"),
            Verdict::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of checking one fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheck {
    pub fact: ExtractedFact,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_url: Option<String>,
    pub confidence: f64,
    /// Best similarity observed against any page
    pub similarity: f64,
}

/// Aggregated fact checks for one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub supported: Vec<FactCheck>,
    pub contradicted: Vec<FactCheck>,
    pub unknown: Vec<FactCheck>,
    /// url -> content of every usable page
    pub web_evidence: BTreeMap<String, String>,
    pub confidence: f64,
}

impl ValidationResult {
    /// No facts, no evidence, zero confidence
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.supported.len() + self.contradicted.len() + self.unknown.len()
    }

    /// All checks in verdict order (supported, contradicted, unknown)
    pub fn checks(&self) -> impl Iterator<Item = &FactCheck> {
        self.supported
            .iter()
            .chain(self.contradicted.iter())
            .chain(self.unknown.iter())
    }

    /// Providers with at least one contradicted fact, sorted
    pub fn contradicting_providers(&self) -> BTreeSet<ProviderId> {
        self.contradicted
            .iter()
            .map(|c| c.fact.source_provider.clone())
            .collect()
    }

    /// `(supported, contradicted, total)` fact counts for one provider
    pub fn tally_for(&self, provider: &ProviderId) -> (usize, usize, usize) {
        let count = |checks: &[FactCheck]| {
            checks
                .iter()
                .filter(|c| &c.fact.source_provider == provider)
                .count()
        };
        let supported = count(&self.supported);
        let contradicted = count(&self.contradicted);
        (supported, contradicted, supported + contradicted + count(&self.unknown))
    }
}
