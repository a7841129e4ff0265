//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid provider id: {0}")]
    InvalidProvider(String),

    #[error("Invalid evidence: {0}")]
    InvalidEvidence(#[from] EvidenceError),
}

/// Reasons a piece of web evidence is rejected before validation.
///
/// Rejected evidence is dropped and logged; it never fails a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvidenceError {
    #[error("URL is not HTTPS: {0}")]
    NotHttps(String),

    #[error("Malformed URL: {0}")]
    InvalidUrl(String),

    #[error("Page has no usable content: {0}")]
    EmptyContent(String),
}
