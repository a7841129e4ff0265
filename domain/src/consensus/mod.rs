//! Consensus integration - fusing provider answers into one ranked result.
//!
//! Responses are grouped by near-duplicate fingerprint, the clusters are
//! ranked with a fixed tie-break order, and one verbatim member of the
//! winning cluster becomes the final answer. Nothing here synthesizes text.

pub mod cluster;
pub mod integrator;
pub mod result;

pub use cluster::{ClusterMember, ConsensusCluster, TieBreak};
pub use integrator::ConsensusIntegrator;
pub use result::{ClusterSummary, ConsensusResult, FactSummary, FactTrace, ReasoningTrace};
