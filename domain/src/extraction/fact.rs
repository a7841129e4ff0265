//! Extracted fact value object

use serde::{Deserialize, Serialize};

use crate::core::provider::ProviderId;

/// A short factual statement taken from one provider's answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFact {
    /// Whitespace-normalized statement, at most 500 characters
    pub text: String,
    /// Provider whose answer contained the statement
    pub source_provider: ProviderId,
    /// Extraction confidence in `[0, 1]`
    pub confidence: f64,
}

impl ExtractedFact {
    pub fn new(text: impl Into<String>, source_provider: ProviderId, confidence: f64) -> Self {
        Self {
            text: text.into(),
            source_provider,
            confidence: crate::core::score::unit_score(confidence),
        }
    }
}
