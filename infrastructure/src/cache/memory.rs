//! Process-local cache backend

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use verity_application::{CacheBackend, CacheError};

struct Entry {
    bytes: Vec<u8>,
    expires_at: Instant,
}

/// TTL-aware in-memory byte store. Expired entries are dropped on read.
#[derive(Default)]
pub struct InMemoryCacheBackend {
    entries: DashMap<String, Entry>,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.bytes.clone()));
            }
        } else {
            return Ok(None);
        }
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| CacheError::Backend("ttl out of range".to_string()))?;
        self.entries.insert(
            key.to_string(),
            Entry {
                bytes: value,
                expires_at,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_after_set() {
        let backend = InMemoryCacheBackend::new();
        backend
            .set("k", b"value".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(b"value".to_vec()));
        assert_eq!(backend.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent_and_removed() {
        let backend = InMemoryCacheBackend::new();
        backend.set("k", b"v".to_vec(), Duration::ZERO).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let backend = InMemoryCacheBackend::new();
        backend.set("old", b"v".to_vec(), Duration::ZERO).await.unwrap();
        backend
            .set("fresh", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(backend.purge_expired(), 1);
        assert_eq!(backend.len(), 1);
    }
}
