//! Consensus clusters and their ranking

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::provider::ProviderId;
use crate::dispatch::ProviderResponse;
use crate::text::{TfIdfModel, fingerprint};

/// Confidence assumed for providers that do not report one
pub const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Scores closer than this compare as equal
const SCORE_EPSILON: f64 = 1e-9;

/// One response inside a cluster
#[derive(Debug, Clone)]
pub struct ClusterMember {
    /// Position of the response in the integrator input
    pub index: usize,
    pub provider_id: ProviderId,
    pub text: String,
    pub confidence: f64,
    /// Externally supplied reliability, if any
    pub reliability: Option<f64>,
}

impl ClusterMember {
    /// Weight used to pick the representative: reliability, else confidence
    pub fn representative_weight(&self) -> f64 {
        self.reliability.unwrap_or(self.confidence)
    }
}

/// Transient grouping of responses sharing a fingerprint
#[derive(Debug, Clone)]
pub struct ConsensusCluster {
    pub fingerprint: String,
    pub members: Vec<ClusterMember>,
    pub avg_confidence: f64,
    pub trust_weight: f64,
    pub tfidf_alignment: f64,
}

/// Which ranking rule separated the winning cluster from its closest rival
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// No usable responses
    NoCandidates,
    /// Only one cluster existed
    Uncontested,
    Membership,
    Trust,
    Confidence,
    TfidfAlignment,
    /// Every rule tied; the first-encountered cluster was kept
    InsertionOrder,
}

impl TieBreak {
    pub fn as_str(&self) -> &'static str {
        match self {
            TieBreak::NoCandidates => "no_candidates",
            TieBreak::Uncontested => "uncontested",
            TieBreak::Membership => "membership",
            TieBreak::Trust => "trust",
            TieBreak::Confidence => "confidence",
            TieBreak::TfidfAlignment => "tfidf_alignment",
            TieBreak::InsertionOrder => "insertion_order",
        }
    }
}

impl std::fmt::Display for TieBreak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConsensusCluster {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn member_ids(&self) -> Vec<ProviderId> {
        self.members.iter().map(|m| m.provider_id.clone()).collect()
    }

    /// Member with the highest reliability (falling back to confidence);
    /// the earliest member wins ties.
    pub fn representative(&self) -> Option<&ClusterMember> {
        self.members.iter().fold(None, |best: Option<&ClusterMember>, m| match best {
            Some(b) if m.representative_weight() <= b.representative_weight() + SCORE_EPSILON => {
                Some(b)
            }
            _ => Some(m),
        })
    }

    /// Compare two clusters rule by rule: membership, trust, confidence,
    /// TF-IDF alignment. Returns the ordering and the rule that decided it
    /// (`InsertionOrder` when all four tie).
    pub fn rank_against(&self, other: &Self) -> (Ordering, TieBreak) {
        let size = self.size().cmp(&other.size());
        if size != Ordering::Equal {
            return (size, TieBreak::Membership);
        }
        let rules = [
            (self.trust_weight, other.trust_weight, TieBreak::Trust),
            (self.avg_confidence, other.avg_confidence, TieBreak::Confidence),
            (self.tfidf_alignment, other.tfidf_alignment, TieBreak::TfidfAlignment),
        ];
        for (mine, theirs, rule) in rules {
            let ordering = compare_scores(mine, theirs);
            if ordering != Ordering::Equal {
                return (ordering, rule);
            }
        }
        (Ordering::Equal, TieBreak::InsertionOrder)
    }
}

fn compare_scores(a: f64, b: f64) -> Ordering {
    if (a - b).abs() <= SCORE_EPSILON {
        Ordering::Equal
    } else {
        a.total_cmp(&b)
    }
}

/// Group responses by fingerprint, preserving first-encounter order, and
/// score each cluster.
///
/// `responses[i]` must correspond to document `i` of `tfidf`.
pub fn build_clusters(
    responses: &[&ProviderResponse],
    reliability: &BTreeMap<ProviderId, f64>,
    tfidf: &TfIdfModel,
) -> Vec<ConsensusCluster> {
    let mut clusters: Vec<ConsensusCluster> = Vec::new();

    for (index, response) in responses.iter().enumerate() {
        let print = fingerprint(&response.text);
        let member = ClusterMember {
            index,
            provider_id: response.provider_id.clone(),
            text: response.text.clone(),
            confidence: response.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            reliability: reliability
                .get(&response.provider_id)
                .map(|r| r.clamp(0.0, 1.0)),
        };
        match clusters.iter_mut().find(|c| c.fingerprint == print) {
            Some(cluster) => cluster.members.push(member),
            None => clusters.push(ConsensusCluster {
                fingerprint: print,
                members: vec![member],
                avg_confidence: 0.0,
                trust_weight: 0.0,
                tfidf_alignment: 0.0,
            }),
        }
    }

    for cluster in &mut clusters {
        score_cluster(cluster, tfidf);
    }
    clusters
}

fn score_cluster(cluster: &mut ConsensusCluster, tfidf: &TfIdfModel) {
    let n = cluster.members.len().max(1) as f64;
    let avg_confidence = cluster.members.iter().map(|m| m.confidence).sum::<f64>() / n;
    let trust_weight = cluster
        .members
        .iter()
        .map(|m| m.reliability.unwrap_or(avg_confidence))
        .sum::<f64>();
    let anchor = cluster.members.first().map(|m| m.index).unwrap_or_default();
    let tfidf_alignment = cluster
        .members
        .iter()
        .map(|m| tfidf.similarity(m.index, anchor))
        .sum::<f64>()
        / n;

    cluster.avg_confidence = avg_confidence;
    cluster.trust_weight = trust_weight;
    cluster.tfidf_alignment = tfidf_alignment;
}

/// Pick the winning cluster. Ties after every rule keep the earlier cluster.
///
/// Returns the winner's position and the rule that separated it from its
/// closest rival.
pub fn select_winner(clusters: &[ConsensusCluster]) -> Option<(usize, TieBreak)> {
    let first = clusters.first()?;
    let mut best = (0usize, first);
    for (i, cluster) in clusters.iter().enumerate().skip(1) {
        if cluster.rank_against(best.1).0 == Ordering::Greater {
            best = (i, cluster);
        }
    }

    let decided_by = clusters
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != best.0)
        .map(|(_, rival)| best.1.rank_against(rival).1)
        .max()
        .unwrap_or(TieBreak::Uncontested);

    Some((best.0, decided_by))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(provider: &str, text: &str) -> ProviderResponse {
        ProviderResponse::success(ProviderId::new(provider).unwrap(), text, 10)
    }

    fn clusters_for(
        responses: &[ProviderResponse],
        reliability: &BTreeMap<ProviderId, f64>,
    ) -> Vec<ConsensusCluster> {
        let refs: Vec<&ProviderResponse> = responses.iter().collect();
        let texts: Vec<&str> = responses.iter().map(|r| r.text.as_str()).collect();
        build_clusters(&refs, reliability, &TfIdfModel::fit(&texts))
    }

    #[test]
    fn test_near_duplicates_share_a_cluster() {
        let responses = vec![
            response("a", "Paris is the capital of France."),
            response("b", "paris is the capital of france"),
            response("c", "Lyon is the capital of France."),
        ];
        let clusters = clusters_for(&responses, &BTreeMap::new());
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].size(), 2);
        assert_eq!(clusters[1].size(), 1);
        assert!((clusters[0].avg_confidence - DEFAULT_CONFIDENCE).abs() < 1e-9);
        // Trust defaults to avg confidence per member
        assert!((clusters[0].trust_weight - 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_membership_wins_first() {
        let responses = vec![
            response("a", "Lyon."),
            response("b", "Paris."),
            response("c", "Paris."),
        ];
        let clusters = clusters_for(&responses, &BTreeMap::new());
        let (winner, rule) = select_winner(&clusters).unwrap();
        assert_eq!(clusters[winner].fingerprint, fingerprint("Paris."));
        assert_eq!(rule, TieBreak::Membership);
    }

    #[test]
    fn test_trust_breaks_membership_tie() {
        let responses = vec![response("a", "Lyon."), response("b", "Paris.")];
        let reliability = BTreeMap::from([
            (ProviderId::new("a").unwrap(), 0.2),
            (ProviderId::new("b").unwrap(), 0.9),
        ]);
        let clusters = clusters_for(&responses, &reliability);
        let (winner, rule) = select_winner(&clusters).unwrap();
        assert_eq!(winner, 1);
        assert_eq!(rule, TieBreak::Trust);
    }

    #[test]
    fn test_confidence_breaks_trust_tie() {
        let responses = vec![
            response("a", "Lyon.").with_confidence(Some(0.5)),
            response("b", "Paris.").with_confidence(Some(0.9)),
        ];
        let reliability = BTreeMap::from([
            (ProviderId::new("a").unwrap(), 0.8),
            (ProviderId::new("b").unwrap(), 0.8),
        ]);
        let clusters = clusters_for(&responses, &reliability);
        let (winner, rule) = select_winner(&clusters).unwrap();
        assert_eq!(winner, 1);
        assert_eq!(rule, TieBreak::Confidence);
    }

    #[test]
    fn test_full_tie_keeps_first_cluster() {
        let responses = vec![response("a", "Lyon."), response("b", "Paris.")];
        let clusters = clusters_for(&responses, &BTreeMap::new());
        let (winner, rule) = select_winner(&clusters).unwrap();
        assert_eq!(winner, 0);
        assert_eq!(rule, TieBreak::InsertionOrder);
    }

    #[test]
    fn test_single_cluster_is_uncontested() {
        let responses = vec![response("a", "Paris."), response("b", "Paris.")];
        let clusters = clusters_for(&responses, &BTreeMap::new());
        assert_eq!(select_winner(&clusters), Some((0, TieBreak::Uncontested)));
        assert_eq!(select_winner(&[]), None);
    }

    #[test]
    fn test_representative_prefers_reliability_then_first() {
        let responses = vec![
            response("a", "Paris.").with_confidence(Some(0.95)),
            response("b", "Paris."),
            response("c", "Paris."),
        ];
        let reliability = BTreeMap::from([
            (ProviderId::new("b").unwrap(), 0.9),
            (ProviderId::new("c").unwrap(), 0.9),
        ]);
        let clusters = clusters_for(&responses, &reliability);
        // a falls back to its confidence (0.95), beating b and c
        assert_eq!(clusters[0].representative().unwrap().provider_id.as_str(), "a");

        let clusters = clusters_for(&responses[1..], &reliability);
        assert_eq!(clusters[0].representative().unwrap().provider_id.as_str(), "b");
    }
}
