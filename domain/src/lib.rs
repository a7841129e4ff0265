//! Domain layer for verity
//!
//! Entities, value objects and the pure algorithms of the consensus
//! pipeline. Nothing here performs I/O, reads the clock or draws random
//! numbers, so every function is deterministic for a given input.
//!
//! # Pipeline
//!
//! 1. **Dispatch** results arrive as [`ProviderResponse`]s
//! 2. **Extraction** turns successful responses into [`ExtractedFact`]s
//! 3. **Validation** classifies each fact against [`WebDocument`]s
//! 4. **Integration** clusters responses by fingerprint and picks a
//!    verbatim winner, producing a [`ConsensusResult`]

pub mod config;
pub mod consensus;
pub mod core;
pub mod dispatch;
pub mod extraction;
pub mod response;
pub mod text;
pub mod validation;

pub use config::OutputFormat;
pub use consensus::{
    ClusterSummary, ConsensusIntegrator, ConsensusResult, FactSummary, FactTrace, ReasoningTrace,
    TieBreak,
};
pub use core::{
    cache_key::CacheKey,
    error::{DomainError, EvidenceError},
    provider::ProviderId,
    query::Query,
};
pub use dispatch::{EmptyResultReason, ProviderErrorKind, ProviderResponse, classify_empty_result};
pub use extraction::{ExtractedFact, FactExtractor};
pub use response::{CacheStatus, ConsensusResponse, ResponseMeta, SCHEMA_VERSION};
pub use validation::{
    EvidenceValidator, FactCheck, MAX_WEB_DOCUMENTS, PageStatus, ValidationResult, Verdict,
    WebDocument, sanitize_url, sanitize_urls,
};
