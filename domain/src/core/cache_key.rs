//! Deterministic cache keys for consensus results

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::query::Query;

/// Cache key for a consensus result (Value Object)
///
/// `namespace ":" hex(sha256(prompt ":" context_or_default))`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_query(namespace: &str, query: &Query) -> Self {
        Self::from_parts(namespace, query.prompt(), query.context_or_default())
    }

    pub fn from_parts(namespace: &str, prompt: &str, context: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(prompt.as_bytes());
        hasher.update(b":");
        hasher.update(context.as_bytes());
        let digest = hasher.finalize();
        Self(format!("{}:{}", namespace, hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
