//! Cache ports
//!
//! [`CacheBackend`] is a dumb byte store; [`ResultCache`] sits on top of it
//! and owns encoding, sealing and verification. Every failure at that level
//! is reported to the caller as a miss.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use verity_domain::{CacheKey, ConsensusResult};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache codec error: {0}")]
    Codec(String),

    #[error("Cache entry failed integrity check")]
    Integrity,

    #[error("Cache operation timed out")]
    Timeout,
}

/// Byte-oriented key-value store with per-entry TTL
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}

/// Best-effort store of consensus results
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<ConsensusResult>;

    async fn set(&self, key: &CacheKey, value: &ConsensusResult, ttl: Duration);
}

/// Cache that never stores anything
pub struct NoCache;

#[async_trait]
impl ResultCache for NoCache {
    async fn get(&self, _key: &CacheKey) -> Option<ConsensusResult> {
        None
    }

    async fn set(&self, _key: &CacheKey, _value: &ConsensusResult, _ttl: Duration) {}
}
