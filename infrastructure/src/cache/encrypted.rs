//! [`ResultCache`] over a byte backend with sealed entries

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use verity_application::{CacheBackend, CacheError, ResultCache};
use verity_domain::{CacheKey, ConsensusResult};

use super::sealed::CacheSealer;

/// Best-effort encrypted cache.
///
/// The cache key doubles as associated data, so an entry copied under a
/// different key fails to open. Every error becomes a miss.
pub struct EncryptedResultCache {
    backend: Arc<dyn CacheBackend>,
    sealer: CacheSealer,
}

impl EncryptedResultCache {
    pub fn new(backend: Arc<dyn CacheBackend>, secret: &str) -> Result<Self, CacheError> {
        Ok(Self {
            backend,
            sealer: CacheSealer::new(secret)?,
        })
    }
}

#[async_trait]
impl ResultCache for EncryptedResultCache {
    async fn get(&self, key: &CacheKey) -> Option<ConsensusResult> {
        let bytes = match self.backend.get(key.as_str()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("Cache miss for {}", key);
                return None;
            }
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        match self.sealer.open(key.as_str().as_bytes(), &bytes) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &CacheKey, value: &ConsensusResult, ttl: Duration) {
        let sealed = match self.sealer.seal(key.as_str().as_bytes(), value) {
            Ok(sealed) => sealed,
            Err(e) => {
                warn!("Could not seal cache entry {}: {}", key, e);
                return;
            }
        };

        if let Err(e) = self.backend.set(key.as_str(), sealed, ttl).await {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FsCacheBackend, InMemoryCacheBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use verity_application::{
        ConsensusEngine, ConsensusRequest, EngineConfig, InferenceRequest, Provider, ProviderError,
        ProviderOutput,
    };
    use verity_domain::{CacheStatus, ProviderId, Query};

    fn key(prompt: &str) -> CacheKey {
        CacheKey::for_query("verity", &Query::new(prompt).unwrap())
    }

    fn result() -> ConsensusResult {
        let mut result = ConsensusResult::empty();
        result.final_answer = "Paris is the capital of France.".to_string();
        result.representative_model = Some("alpha".parse().unwrap());
        result.contributing_models = vec!["alpha".parse().unwrap(), "bravo".parse().unwrap()];
        result.model_consensus_score = 0.8125;
        result.web_validation_score = 0.7;
        result.composite_confidence = 0.7675;
        result
    }

    struct EchoProvider {
        id: ProviderId,
        calls: AtomicUsize,
    }

    impl EchoProvider {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: ProviderId::new(id).unwrap(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Provider for EchoProvider {
        fn id(&self) -> &ProviderId {
            &self.id
        }

        async fn infer(&self, _request: &InferenceRequest) -> Result<ProviderOutput, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderOutput::new("Paris is the capital of France."))
        }
    }

    fn engine_with(cache: EncryptedResultCache, providers: Vec<Arc<dyn Provider>>) -> ConsensusEngine {
        let config = EngineConfig::default().with_cache_secret("s3cret");
        ConsensusEngine::new(config, providers)
            .unwrap()
            .with_cache(Arc::new(cache))
    }

    fn capital_request() -> ConsensusRequest {
        ConsensusRequest::new("What is the capital of France?").unwrap()
    }

    struct FailingBackend;

    #[async_trait]
    impl CacheBackend for FailingBackend {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let cache =
            EncryptedResultCache::new(Arc::new(InMemoryCacheBackend::new()), "s3cret").unwrap();
        let k = key("capital of France");

        assert!(cache.get(&k).await.is_none());
        cache.set(&k, &result(), Duration::from_secs(60)).await;
        assert_eq!(cache.get(&k).await, Some(result()));
    }

    #[tokio::test]
    async fn test_tampered_entry_is_a_miss() {
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = EncryptedResultCache::new(backend.clone(), "s3cret").unwrap();
        let k = key("capital of France");
        cache.set(&k, &result(), Duration::from_secs(60)).await;

        let mut stored = backend.get(k.as_str()).await.unwrap().unwrap();
        let mid = stored.len() / 2;
        stored[mid] ^= 0x01;
        backend
            .set(k.as_str(), stored, Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.get(&k).await.is_none());
    }

    #[tokio::test]
    async fn test_entry_moved_to_other_key_is_a_miss() {
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = EncryptedResultCache::new(backend.clone(), "s3cret").unwrap();
        let a = key("capital of France");
        let b = key("capital of Italy");
        cache.set(&a, &result(), Duration::from_secs(60)).await;

        let stored = backend.get(a.as_str()).await.unwrap().unwrap();
        backend
            .set(b.as_str(), stored, Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.get(&b).await.is_none());
    }

    #[tokio::test]
    async fn test_backend_errors_are_swallowed() {
        let cache = EncryptedResultCache::new(Arc::new(FailingBackend), "s3cret").unwrap();
        let k = key("capital of France");
        cache.set(&k, &result(), Duration::from_secs(60)).await;
        assert!(cache.get(&k).await.is_none());
    }

    #[test]
    fn test_flushed_write_survives_runtime_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FsCacheBackend::new(dir.path()));
        let cache = EncryptedResultCache::new(backend, "s3cret").unwrap();
        let providers: Vec<Arc<dyn Provider>> = vec![EchoProvider::new("alpha"), EchoProvider::new("bravo")];
        let engine = engine_with(cache, providers);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let response = runtime.block_on(async {
            let response = engine.run(capital_request()).await.unwrap();
            engine.flush_cache_writes().await;
            response
        });
        drop(runtime);

        assert_eq!(response.meta.cache, CacheStatus::Miss);
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "bin"))
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_recomputed() {
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = EncryptedResultCache::new(backend.clone(), "s3cret").unwrap();
        let alpha = EchoProvider::new("alpha");
        let providers: Vec<Arc<dyn Provider>> = vec![alpha.clone(), EchoProvider::new("bravo")];
        let engine = engine_with(cache, providers);

        engine.run(capital_request()).await.unwrap();
        engine.flush_cache_writes().await;
        assert_eq!(backend.len(), 1);

        let k = CacheKey::for_query(
            &engine.config().cache.namespace,
            &Query::new("What is the capital of France?").unwrap(),
        );
        backend
            .set(k.as_str(), b"not a sealed entry".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        let response = engine.run(capital_request()).await.unwrap();
        assert_eq!(response.meta.cache, CacheStatus::Miss);
        assert_eq!(response.final_answer, "Paris is the capital of France.");
        assert_eq!(alpha.calls.load(Ordering::SeqCst), 2);
    }
}
