//! Consensus result and its reasoning trace

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::cluster::TieBreak;
use crate::core::provider::ProviderId;
use crate::validation::Verdict;

/// Final artifact of consensus integration.
///
/// All scores are clamped to `[0, 1]` and rounded to four decimals.
/// `final_answer` is always the verbatim text of one provider response,
/// or empty when there was nothing to integrate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub final_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub representative_model: Option<ProviderId>,
    /// Members of the winning cluster
    #[serde(default)]
    pub contributing_models: Vec<ProviderId>,
    pub model_consensus_score: f64,
    pub web_validation_score: f64,
    pub composite_confidence: f64,
    /// url -> excerpt of every page that decided a fact check
    #[serde(default)]
    pub evidence_used: BTreeMap<String, String>,
    #[serde(default)]
    pub contradicting_models: Vec<ProviderId>,
    pub reasoning_trace: ReasoningTrace,
}

impl ConsensusResult {
    /// Zero-valued result with no representative.
    ///
    /// Produced when there are no usable responses; callers must treat it
    /// as a valid terminal state, not an error.
    pub fn empty() -> Self {
        Self {
            final_answer: String::new(),
            representative_model: None,
            contributing_models: Vec::new(),
            model_consensus_score: 0.0,
            web_validation_score: 0.0,
            composite_confidence: 0.0,
            evidence_used: BTreeMap::new(),
            contradicting_models: Vec::new(),
            reasoning_trace: ReasoningTrace::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.representative_model.is_none()
    }
}

/// Auditable record of how the final answer was chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningTrace {
    pub clusters: Vec<ClusterSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_fingerprint: Option<String>,
    pub tie_break: TieBreak,
    /// Per-response consensus score, keyed by provider id
    pub per_model_scores: BTreeMap<String, f64>,
    pub fact_summary: FactSummary,
    #[serde(default)]
    pub validated_facts: Vec<FactTrace>,
}

impl Default for ReasoningTrace {
    fn default() -> Self {
        Self {
            clusters: Vec::new(),
            winning_fingerprint: None,
            tie_break: TieBreak::NoCandidates,
            per_model_scores: BTreeMap::new(),
            fact_summary: FactSummary::default(),
            validated_facts: Vec::new(),
        }
    }
}

/// Snapshot of one cluster's ranking inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub fingerprint: String,
    pub members: Vec<ProviderId>,
    pub avg_confidence: f64,
    pub trust_weight: f64,
    pub tfidf_alignment: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactSummary {
    pub supported: usize,
    pub contradicted: usize,
    pub unknown: usize,
}

/// One fact check as recorded in the trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactTrace {
    pub fact: String,
    pub provider: ProviderId,
    pub verdict: Verdict,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_url: Option<String>,
}
