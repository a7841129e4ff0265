//! Core domain concepts shared across all subdomains.
//!
//! - [`provider::ProviderId`]: identifier of an answer-generating backend
//! - [`query::Query`]: a validated query (prompt plus optional context)
//! - [`cache_key::CacheKey`]: deterministic fingerprint of a query for caching
//! - [`error::DomainError`]: domain-level errors

pub mod cache_key;
pub mod error;
pub mod provider;
pub mod query;
pub mod score;
pub mod string;
