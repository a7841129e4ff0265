//! Consensus integration
//!
//! Per-response score:
//! `reliability*0.5 + similarity_to_baseline*0.3 + tfidf*0.1 + validation_bonus - hallucination_penalty`
//! floored at 0, where the baseline is the chosen representative answer.

use std::collections::BTreeMap;

use super::cluster::{ConsensusCluster, DEFAULT_CONFIDENCE, build_clusters, select_winner};
use super::result::{ClusterSummary, ConsensusResult, FactSummary, FactTrace, ReasoningTrace};
use crate::core::provider::ProviderId;
use crate::core::score::{clamp_unit, round4, unit_score};
use crate::core::string::truncate;
use crate::dispatch::ProviderResponse;
use crate::text::{TfIdfModel, cosine_similarity, token_counts, word_tokens};
use crate::validation::ValidationResult;

const RELIABILITY_WEIGHT: f64 = 0.5;
const SIMILARITY_WEIGHT: f64 = 0.3;
const TFIDF_WEIGHT: f64 = 0.1;
const VALIDATION_BONUS: f64 = 0.1;
const HALLUCINATION_PENALTY: f64 = 0.2;

const MODEL_WEIGHT: f64 = 0.6;
const WEB_WEIGHT: f64 = 0.4;

/// Maximum bytes of page content quoted in `evidence_used`
const EVIDENCE_EXCERPT_LEN: usize = 280;

/// Fuses provider responses and validation results into a [`ConsensusResult`]
#[derive(Debug, Clone, Default)]
pub struct ConsensusIntegrator;

impl ConsensusIntegrator {
    pub fn new() -> Self {
        Self
    }

    /// Integrate the usable responses.
    ///
    /// Failed or blank responses are ignored; if none remain the zero-valued
    /// [`ConsensusResult::empty`] is returned. The result depends only on the
    /// inputs and their order, never on hashing or time.
    pub fn integrate(
        &self,
        responses: &[ProviderResponse],
        validation: &ValidationResult,
        reliability: &BTreeMap<ProviderId, f64>,
    ) -> ConsensusResult {
        let usable: Vec<&ProviderResponse> = responses.iter().filter(|r| r.is_success()).collect();
        if usable.is_empty() {
            return ConsensusResult::empty();
        }

        let texts: Vec<&str> = usable.iter().map(|r| r.text.as_str()).collect();
        let tfidf = TfIdfModel::fit(&texts);
        let clusters = build_clusters(&usable, reliability, &tfidf);

        let Some((winner_idx, tie_break)) = select_winner(&clusters) else {
            return ConsensusResult::empty();
        };
        let winner = &clusters[winner_idx];
        let Some(representative) = winner.representative() else {
            return ConsensusResult::empty();
        };

        let baseline = token_counts(word_tokens(&representative.text));
        let per_model_scores: BTreeMap<String, f64> = usable
            .iter()
            .enumerate()
            .map(|(i, response)| {
                let score = response_score(
                    response,
                    reliability,
                    cosine_similarity(&token_counts(word_tokens(&response.text)), &baseline),
                    tfidf.similarity(i, representative.index),
                    validation,
                );
                (response.provider_id.to_string(), round4(score))
            })
            .collect();

        let model_consensus_score = unit_score(
            per_model_scores.values().sum::<f64>() / per_model_scores.len().max(1) as f64,
        );
        let web_validation_score = unit_score(validation.confidence);
        let composite_confidence =
            unit_score(MODEL_WEIGHT * model_consensus_score + WEB_WEIGHT * web_validation_score);

        ConsensusResult {
            final_answer: representative.text.clone(),
            representative_model: Some(representative.provider_id.clone()),
            contributing_models: winner.member_ids(),
            model_consensus_score,
            web_validation_score,
            composite_confidence,
            evidence_used: evidence_used(validation),
            contradicting_models: validation.contradicting_providers().into_iter().collect(),
            reasoning_trace: ReasoningTrace {
                clusters: clusters.iter().map(summarize).collect(),
                winning_fingerprint: Some(winner.fingerprint.clone()),
                tie_break,
                per_model_scores,
                fact_summary: FactSummary {
                    supported: validation.supported.len(),
                    contradicted: validation.contradicted.len(),
                    unknown: validation.unknown.len(),
                },
                validated_facts: validation
                    .checks()
                    .map(|c| FactTrace {
                        fact: c.fact.text.clone(),
                        provider: c.fact.source_provider.clone(),
                        verdict: c.verdict,
                        confidence: c.confidence,
                        evidence_url: c.evidence_url.clone(),
                    })
                    .collect(),
            },
        }
    }
}

fn response_score(
    response: &ProviderResponse,
    reliability: &BTreeMap<ProviderId, f64>,
    similarity_to_baseline: f64,
    tfidf: f64,
    validation: &ValidationResult,
) -> f64 {
    let reliability = reliability
        .get(&response.provider_id)
        .copied()
        .or(response.confidence)
        .unwrap_or(DEFAULT_CONFIDENCE);

    let (supported, contradicted, total) = validation.tally_for(&response.provider_id);
    let (bonus, penalty) = if total == 0 {
        (0.0, 0.0)
    } else {
        (
            VALIDATION_BONUS * supported as f64 / total as f64,
            HALLUCINATION_PENALTY * contradicted as f64 / total as f64,
        )
    };

    let raw = clamp_unit(reliability) * RELIABILITY_WEIGHT
        + clamp_unit(similarity_to_baseline) * SIMILARITY_WEIGHT
        + clamp_unit(tfidf) * TFIDF_WEIGHT
        + bonus
        - penalty;
    clamp_unit(raw.max(0.0))
}

fn evidence_used(validation: &ValidationResult) -> BTreeMap<String, String> {
    validation
        .checks()
        .filter_map(|c| c.evidence_url.as_ref())
        .filter_map(|url| {
            validation
                .web_evidence
                .get(url)
                .map(|content| (url.clone(), truncate(content, EVIDENCE_EXCERPT_LEN)))
        })
        .collect()
}

fn summarize(cluster: &ConsensusCluster) -> ClusterSummary {
    ClusterSummary {
        fingerprint: cluster.fingerprint.clone(),
        members: cluster.member_ids(),
        avg_confidence: round4(cluster.avg_confidence),
        trust_weight: round4(cluster.trust_weight),
        tfidf_alignment: round4(cluster.tfidf_alignment),
    }
}
