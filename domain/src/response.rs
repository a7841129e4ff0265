//! Caller-facing response contract
//!
//! The JSON shape is versioned by [`SCHEMA_VERSION`] and only ever grows:
//! fields may be added, never renamed or removed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::consensus::{ConsensusResult, ReasoningTrace};
use crate::core::provider::ProviderId;

pub const SCHEMA_VERSION: &str = "1.0";

/// Where the consensus result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
    Disabled,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
            CacheStatus::Disabled => "disabled",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub schema_version: String,
    /// Name of the consensus policy that produced the answer
    pub policy: String,
    /// Milliseconds per provider (`provider:<id>`) and per stage (`stage:<name>`)
    #[serde(default)]
    pub latencies: BTreeMap<String, u64>,
    pub cache: CacheStatus,
    /// RFC 3339 timestamp
    pub generated_at: String,
    #[serde(default)]
    pub dispatched: usize,
    #[serde(default)]
    pub succeeded: usize,
}

impl ResponseMeta {
    pub fn new(policy: impl Into<String>, cache: CacheStatus, generated_at: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            policy: policy.into(),
            latencies: BTreeMap::new(),
            cache,
            generated_at: generated_at.into(),
            dispatched: 0,
            succeeded: 0,
        }
    }

    pub fn with_provider_latency(mut self, provider: &ProviderId, ms: u64) -> Self {
        self.latencies.insert(format!("provider:{}", provider), ms);
        self
    }

    pub fn with_stage_latency(mut self, stage: &str, ms: u64) -> Self {
        self.latencies.insert(format!("stage:{}", stage), ms);
        self
    }

    pub fn with_counts(mut self, dispatched: usize, succeeded: usize) -> Self {
        self.dispatched = dispatched;
        self.succeeded = succeeded;
        self
    }
}

/// What the engine hands back to its caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResponse {
    pub final_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub representative_model: Option<ProviderId>,
    #[serde(default)]
    pub contributing_models: Vec<ProviderId>,
    pub model_consensus_score: f64,
    pub web_validation_score: f64,
    pub composite_confidence: f64,
    #[serde(default)]
    pub evidence_used: BTreeMap<String, String>,
    #[serde(default)]
    pub contradicting_models: Vec<ProviderId>,
    pub reasoning_trace: ReasoningTrace,
    pub meta: ResponseMeta,
}

impl ConsensusResponse {
    pub fn from_result(result: ConsensusResult, meta: ResponseMeta) -> Self {
        Self {
            final_answer: result.final_answer,
            representative_model: result.representative_model,
            contributing_models: result.contributing_models,
            model_consensus_score: result.model_consensus_score,
            web_validation_score: result.web_validation_score,
            composite_confidence: result.composite_confidence,
            evidence_used: result.evidence_used,
            contradicting_models: result.contradicting_models,
            reasoning_trace: result.reasoning_trace,
            meta,
        }
    }

    /// Strip the metadata, leaving the cacheable artifact
    pub fn into_result(self) -> ConsensusResult {
        ConsensusResult {
            final_answer: self.final_answer,
            representative_model: self.representative_model,
            contributing_models: self.contributing_models,
            model_consensus_score: self.model_consensus_score,
            web_validation_score: self.web_validation_score,
            composite_confidence: self.composite_confidence,
            evidence_used: self.evidence_used,
            contradicting_models: self.contradicting_models,
            reasoning_trace: self.reasoning_trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_carries_schema_version() {
        let meta = ResponseMeta::new("majority-trust", CacheStatus::Miss, "2026-01-01T00:00:00Z");
        let response = ConsensusResponse::from_result(ConsensusResult::empty(), meta);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["meta"]["schema_version"], "1.0");
        assert_eq!(json["meta"]["cache"], "miss");
        assert_eq!(json["final_answer"], "");
        assert!(json.get("representative_model").is_none());
    }

    #[test]
    fn test_latency_keys_are_namespaced() {
        let id = ProviderId::new("alpha").unwrap();
        let meta = ResponseMeta::new("p", CacheStatus::Disabled, "t")
            .with_provider_latency(&id, 120)
            .with_stage_latency("dispatch", 130)
            .with_counts(3, 2);

        assert_eq!(meta.latencies["provider:alpha"], 120);
        assert_eq!(meta.latencies["stage:dispatch"], 130);
        assert_eq!((meta.dispatched, meta.succeeded), (3, 2));
    }

    #[test]
    fn test_result_round_trips_through_response() {
        let result = ConsensusResult::empty();
        let meta = ResponseMeta::new("p", CacheStatus::Hit, "t");
        let back = ConsensusResponse::from_result(result.clone(), meta).into_result();
        assert_eq!(back, result);
    }

    #[test]
    fn test_unknown_fields_are_tolerated() {
        let json = r#"{
            "final_answer": "x",
            "model_consensus_score": 0.5,
            "web_validation_score": 0.0,
            "composite_confidence": 0.3,
            "reasoning_trace": {
                "clusters": [],
                "tie_break": "no_candidates",
                "per_model_scores": {},
                "fact_summary": {"supported": 0, "contradicted": 0, "unknown": 0},
                "validated_facts": []
            },
            "meta": {
                "schema_version": "1.1",
                "policy": "p",
                "cache": "miss",
                "generated_at": "t",
                "added_later": true
            }
        }"#;
        let response: ConsensusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.final_answer, "x");
        assert_eq!(response.meta.schema_version, "1.1");
    }
}
