//! Run Consensus use case
//!
//! Orchestrates the full pipeline for one query:
//! admission -> cache read -> dispatch -> extraction -> validation ->
//! integration -> cache write (background) -> audit.
//!
//! Cache writes run on background tasks tracked by the engine; callers that
//! are about to shut the runtime down should await
//! [`ConsensusEngine::flush_cache_writes`] first.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use verity_domain::{
    CacheKey, CacheStatus, ConsensusIntegrator, ConsensusResponse, ConsensusResult, DomainError,
    EmptyResultReason, EvidenceValidator, FactExtractor, ProviderId, ProviderResponse, Query,
    ResponseMeta, ValidationResult, classify_empty_result,
};

use super::dispatch::{HealthReport, ProviderDispatcher};
use super::gather_evidence::EvidenceGatherer;
use crate::config::{ConfigError, EngineConfig};
use crate::ports::audit_logger::{AuditEvent, AuditLogger, NoAuditLogger};
use crate::ports::cache::{NoCache, ResultCache};
use crate::ports::progress::{NoProgress, ProgressNotifier, Stage};
use crate::ports::provider::{ConversationTurn, InferenceRequest, Provider};
use crate::ports::web_evidence::WebEvidenceSource;
use crate::resilience::ResilienceRegistry;

/// Errors that end a consensus run without an answer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunConsensusError {
    #[error("No providers configured")]
    NoProviders,

    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] DomainError),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("No usable provider response: {0}")]
    EmptyResult(EmptyResultReason),
}

impl RunConsensusError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoProviders => "no_providers",
            Self::InvalidQuery(_) => "invalid_query",
            Self::RateLimited { .. } => "rate_limited",
            Self::EmptyResult(reason) => reason.code(),
        }
    }
}

/// Input for one consensus run
#[derive(Debug, Clone)]
pub struct ConsensusRequest {
    pub query: Query,
    /// Rate-limit key of the calling client
    pub caller: String,
    pub history: Vec<ConversationTurn>,
    pub use_cache: bool,
    pub validate: bool,
}

impl ConsensusRequest {
    pub const ANONYMOUS_CALLER: &'static str = "anonymous";

    pub fn new(prompt: impl Into<String>) -> Result<Self, RunConsensusError> {
        Ok(Self::from_query(Query::new(prompt)?))
    }

    pub fn from_query(query: Query) -> Self {
        Self {
            query,
            caller: Self::ANONYMOUS_CALLER.to_string(),
            history: Vec::new(),
            use_cache: true,
            validate: true,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.query = self.query.with_context(context);
        self
    }

    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = caller.into();
        self
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }
}

/// The consensus engine: owns its resilience state and adapters
pub struct ConsensusEngine {
    config: EngineConfig,
    providers: Vec<Arc<dyn Provider>>,
    registry: Arc<ResilienceRegistry>,
    dispatcher: ProviderDispatcher,
    evidence: Option<EvidenceGatherer>,
    cache: Arc<dyn ResultCache>,
    audit: Arc<dyn AuditLogger>,
    extractor: FactExtractor,
    validator: EvidenceValidator,
    integrator: ConsensusIntegrator,
    cache_writes: Mutex<JoinSet<()>>,
}

impl ConsensusEngine {
    /// Validate `config` and build an engine with a fresh resilience registry.
    pub fn new(config: EngineConfig, providers: Vec<Arc<dyn Provider>>) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = Arc::new(ResilienceRegistry::new(&config));
        Ok(Self::assemble(config, providers, registry))
    }

    /// Build an engine around an existing registry (shared state or seeded jitter).
    pub fn with_registry(
        config: EngineConfig,
        providers: Vec<Arc<dyn Provider>>,
        registry: Arc<ResilienceRegistry>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(config, providers, registry))
    }

    fn assemble(
        config: EngineConfig,
        providers: Vec<Arc<dyn Provider>>,
        registry: Arc<ResilienceRegistry>,
    ) -> Self {
        let dispatcher = ProviderDispatcher::new(
            Arc::clone(&registry),
            config.deadlines.provider,
            config.consensus.min_sources,
        );
        Self {
            config,
            providers,
            registry,
            dispatcher,
            evidence: None,
            cache: Arc::new(NoCache),
            audit: Arc::new(NoAuditLogger),
            extractor: FactExtractor::new(),
            validator: EvidenceValidator::new(),
            integrator: ConsensusIntegrator::new(),
            cache_writes: Mutex::new(JoinSet::new()),
        }
    }

    pub fn with_evidence_source(mut self, source: Arc<dyn WebEvidenceSource>) -> Self {
        self.evidence = Some(EvidenceGatherer::new(source, self.config.validation.clone()));
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_audit_logger(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ResilienceRegistry> {
        &self.registry
    }

    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|p| p.id().clone()).collect()
    }

    pub async fn health(&self) -> Vec<HealthReport> {
        self.dispatcher.health(&self.providers).await
    }

    /// Execute with default (no-op) progress
    pub async fn run(&self, request: ConsensusRequest) -> Result<ConsensusResponse, RunConsensusError> {
        self.run_with_progress(request, &NoProgress).await
    }

    /// Execute with progress callbacks
    pub async fn run_with_progress(
        &self,
        request: ConsensusRequest,
        progress: &dyn ProgressNotifier,
    ) -> Result<ConsensusResponse, RunConsensusError> {
        if self.providers.is_empty() {
            return Err(RunConsensusError::NoProviders);
        }

        let started = Instant::now();
        let admission = self.registry.admit_caller(&request.caller, started);
        if !admission.allowed {
            warn!("Caller {} rate limited", request.caller);
            return Err(RunConsensusError::RateLimited {
                retry_after_ms: admission.retry_after_ms(),
            });
        }

        let deadline = started + self.config.deadlines.request;
        let key = CacheKey::for_query(&self.config.cache.namespace, &request.query);
        let caching = self.config.cache.enabled && request.use_cache;

        if caching {
            if let Some(result) = self.read_cache(&key).await {
                info!("Cache hit for {}", key);
                let meta = self
                    .meta(CacheStatus::Hit)
                    .with_stage_latency("cache", elapsed_ms(started));
                self.audit.log(AuditEvent::new(
                    "cache_hit",
                    json!({
                        "cache_key": key.as_str(),
                        "caller": request.caller,
                        "final_answer": result.final_answer,
                        "reasoning_trace": result.reasoning_trace,
                    }),
                ));
                return Ok(ConsensusResponse::from_result(result, meta));
            }
        }

        // Stage 1: dispatch
        info!("Dispatching to {} provider(s)", self.providers.len());
        progress.on_stage_start(Stage::Dispatch, self.providers.len());
        let stage_started = Instant::now();
        let inference = InferenceRequest::new(request.query.prompt(), deadline)
            .with_history(request.history.clone());
        let dispatched = self
            .dispatcher
            .dispatch(&inference, &self.providers, progress)
            .await;
        let dispatch_ms = elapsed_ms(stage_started);
        progress.on_stage_complete(Stage::Dispatch);

        let responses: Vec<ProviderResponse> = dispatched.into_values().collect();
        let succeeded = responses.iter().filter(|r| r.is_success()).count();

        if let Some(reason) = classify_empty_result(&responses) {
            warn!("No usable responses: {}", reason);
            self.audit.log(AuditEvent::new(
                "consensus_failed",
                json!({
                    "caller": request.caller,
                    "prompt": request.query.prompt(),
                    "reason": reason.code(),
                    "providers": responses
                        .iter()
                        .map(|r| (r.provider_id.to_string(), r.error.as_ref().map(|e| e.to_string())))
                        .collect::<BTreeMap<_, _>>(),
                }),
            ));
            return Err(RunConsensusError::EmptyResult(reason));
        }

        // Stage 2: extraction
        progress.on_stage_start(Stage::Extraction, succeeded);
        let stage_started = Instant::now();
        let facts = self.extractor.extract_from_responses(&responses);
        let extraction_ms = elapsed_ms(stage_started);
        debug!("Extracted {} fact(s)", facts.len());
        progress.on_stage_complete(Stage::Extraction);

        // Stage 3: validation
        let stage_started = Instant::now();
        let validation = match (&self.evidence, request.validate && self.config.validation.enabled) {
            (Some(gatherer), true) if !facts.is_empty() => {
                progress.on_stage_start(Stage::Validation, facts.len());
                let pages = gatherer.gather(request.query.prompt(), deadline).await;
                let result = self.validator.validate(&facts, &pages);
                info!(
                    "Validation: {} supported, {} contradicted, {} unknown",
                    result.supported.len(),
                    result.contradicted.len(),
                    result.unknown.len()
                );
                progress.on_stage_complete(Stage::Validation);
                result
            }
            _ => {
                debug!("Skipping web validation");
                ValidationResult::empty()
            }
        };
        let validation_ms = elapsed_ms(stage_started);

        // Stage 4: integration
        progress.on_stage_start(Stage::Integration, succeeded);
        let stage_started = Instant::now();
        let result = self
            .integrator
            .integrate(&responses, &validation, &self.config.consensus.reliability);
        let integration_ms = elapsed_ms(stage_started);
        progress.on_stage_complete(Stage::Integration);

        info!(
            "Consensus reached: composite confidence {:.4} ({} contributing)",
            result.composite_confidence,
            result.contributing_models.len()
        );

        if caching {
            self.spawn_cache_write(key.clone(), result.clone());
        }

        let status = if caching {
            CacheStatus::Miss
        } else {
            CacheStatus::Disabled
        };
        let meta = responses
            .iter()
            .fold(self.meta(status), |meta, r| {
                meta.with_provider_latency(&r.provider_id, r.latency_ms)
            })
            .with_stage_latency("dispatch", dispatch_ms)
            .with_stage_latency("extraction", extraction_ms)
            .with_stage_latency("validation", validation_ms)
            .with_stage_latency("integration", integration_ms)
            .with_stage_latency("total", elapsed_ms(started))
            .with_counts(responses.len(), succeeded);

        let response = ConsensusResponse::from_result(result, meta);
        self.audit.log(AuditEvent::new(
            "consensus_completed",
            json!({
                "caller": request.caller,
                "prompt": request.query.prompt(),
                "context": request.query.context_or_default(),
                "final_answer": response.final_answer,
                "composite_confidence": response.composite_confidence,
                "contradicting_models": response.contradicting_models,
                "reasoning_trace": response.reasoning_trace,
                "meta": response.meta,
            }),
        ));
        Ok(response)
    }

    async fn read_cache(&self, key: &CacheKey) -> Option<ConsensusResult> {
        match tokio::time::timeout(self.config.cache.read_timeout, self.cache.get(key)).await {
            Ok(hit) => hit.filter(|r| !r.is_empty()),
            Err(_) => {
                warn!("Cache read timed out after {:?}", self.config.cache.read_timeout);
                None
            }
        }
    }

    fn spawn_cache_write(&self, key: CacheKey, result: ConsensusResult) {
        let cache = Arc::clone(&self.cache);
        let ttl = self.config.cache.ttl;
        let mut writes = self.cache_writes.lock();
        // Reap finished writes so a long-lived engine does not accumulate handles
        while writes.try_join_next().is_some() {}
        writes.spawn(async move {
            cache.set(&key, &result, ttl).await;
            debug!("Cached result under {}", key);
        });
    }

    /// Wait for every pending background cache write to finish.
    ///
    /// Tasks still running when the runtime shuts down are dropped, so a
    /// short-lived process calls this before returning from `main`.
    pub async fn flush_cache_writes(&self) {
        let mut pending = std::mem::take(&mut *self.cache_writes.lock());
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                warn!("Cache write task failed: {}", e);
            }
        }
    }

    fn meta(&self, cache: CacheStatus) -> ResponseMeta {
        ResponseMeta::new(
            self.config.consensus.policy.clone(),
            cache,
            chrono::Utc::now().to_rfc3339(),
        )
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitPolicy;
    use crate::ports::provider::{ProviderError, ProviderOutput};
    use crate::resilience::NoJitter;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use verity_domain::{TieBreak, WebDocument};

    struct FixedProvider {
        id: ProviderId,
        answer: Result<&'static str, ProviderError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn answering(id: &str, text: &'static str) -> Arc<Self> {
            Arc::new(Self {
                id: ProviderId::new(id).unwrap(),
                answer: Ok(text),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(id: &str, error: ProviderError) -> Arc<Self> {
            Arc::new(Self {
                id: ProviderId::new(id).unwrap(),
                answer: Err(error),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn sleeping(id: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                id: ProviderId::new(id).unwrap(),
                answer: Ok("late answer"),
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Provider for FixedProvider {
        fn id(&self) -> &ProviderId {
            &self.id
        }

        async fn infer(&self, _request: &InferenceRequest) -> Result<ProviderOutput, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.answer.clone().map(ProviderOutput::new)
        }
    }

    struct OnePage(&'static str);

    #[async_trait]
    impl WebEvidenceSource for OnePage {
        async fn search(&self, _query: &str, _limit: usize) -> Vec<WebDocument> {
            vec![WebDocument::success("https://evidence.example/page", "")]
        }

        async fn fetch(&self, url: &str, _timeout: Duration) -> WebDocument {
            WebDocument::success(url, self.0)
        }
    }

    #[derive(Default)]
    struct MemoryCache {
        entries: Mutex<HashMap<String, ConsensusResult>>,
    }

    #[async_trait]
    impl ResultCache for MemoryCache {
        async fn get(&self, key: &CacheKey) -> Option<ConsensusResult> {
            self.entries.lock().get(key.as_str()).cloned()
        }

        async fn set(&self, key: &CacheKey, value: &ConsensusResult, _ttl: Duration) {
            self.entries.lock().insert(key.as_str().to_string(), value.clone());
        }
    }

    /// Cache whose reads never finish within the read timeout
    #[derive(Default)]
    struct StalledCache {
        writes: AtomicUsize,
    }

    #[async_trait]
    impl ResultCache for StalledCache {
        async fn get(&self, _key: &CacheKey) -> Option<ConsensusResult> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            None
        }

        async fn set(&self, _key: &CacheKey, _value: &ConsensusResult, _ttl: Duration) {
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingAudit {
        events: Mutex<Vec<&'static str>>,
    }

    impl AuditLogger for RecordingAudit {
        fn log(&self, event: AuditEvent) {
            self.events.lock().push(event.event_type);
        }
    }

    fn engine(config: EngineConfig, providers: Vec<Arc<dyn Provider>>) -> ConsensusEngine {
        let registry = Arc::new(ResilienceRegistry::with_jitter(&config, Arc::new(NoJitter)));
        ConsensusEngine::with_registry(config, providers, registry).unwrap()
    }

    fn paris_lyon() -> Vec<Arc<dyn Provider>> {
        vec![
            FixedProvider::answering("alpha", "Paris is the capital of France."),
            FixedProvider::answering("bravo", "Paris is the capital of France."),
            FixedProvider::answering("charlie", "Paris is the capital of France."),
            FixedProvider::answering("delta", "Lyon is the capital of France."),
        ]
    }

    fn request() -> ConsensusRequest {
        ConsensusRequest::new("What is the capital of France?").unwrap()
    }

    #[tokio::test]
    async fn test_majority_answer_with_contradicting_model() {
        let engine = engine(EngineConfig::default(), paris_lyon()).with_evidence_source(Arc::new(
            OnePage("Lyon is not the capital of France. Paris is the capital of France."),
        ));

        let response = engine.run(request()).await.unwrap();
        assert_eq!(response.final_answer, "Paris is the capital of France.");
        assert_eq!(response.reasoning_trace.tie_break, TieBreak::Membership);
        assert_eq!(
            response.contradicting_models,
            vec![ProviderId::new("delta").unwrap()]
        );
        assert!(response.web_validation_score > 0.0);
        assert_eq!(response.meta.schema_version, "1.0");
        assert_eq!(response.meta.cache, CacheStatus::Disabled);
        assert_eq!((response.meta.dispatched, response.meta.succeeded), (4, 4));
        assert!(response.meta.latencies.contains_key("provider:alpha"));
        assert!(response.meta.latencies.contains_key("stage:dispatch"));
    }

    #[tokio::test]
    async fn test_without_validation_nobody_is_contradicting() {
        let engine = engine(EngineConfig::default(), paris_lyon())
            .with_evidence_source(Arc::new(OnePage("Lyon is not the capital of France.")));

        let response = engine.run(request().without_validation()).await.unwrap();
        assert_eq!(response.final_answer, "Paris is the capital of France.");
        assert!(response.contradicting_models.is_empty());
        assert_eq!(response.web_validation_score, 0.0);
    }

    #[tokio::test]
    async fn test_partial_failure_still_answers() {
        let config = EngineConfig::default()
            .with_deadlines(Duration::from_millis(100), Duration::from_millis(400));
        let providers: Vec<Arc<dyn Provider>> = vec![
            FixedProvider::answering("a", "Paris is the capital of France."),
            FixedProvider::answering("b", "Paris is the capital of France."),
            FixedProvider::answering("c", "Paris is the capital city of France."),
            FixedProvider::sleeping("d", Duration::from_secs(5)),
            FixedProvider::sleeping("e", Duration::from_secs(5)),
        ];
        let engine = engine(config, providers);

        let response = engine.run(request()).await.unwrap();
        assert!(!response.final_answer.is_empty());
        assert_eq!((response.meta.dispatched, response.meta.succeeded), (5, 3));
    }

    #[tokio::test]
    async fn test_all_timeouts_reported_with_reason() {
        let config = EngineConfig::default()
            .with_deadlines(Duration::from_millis(50), Duration::from_millis(200));
        let providers: Vec<Arc<dyn Provider>> = vec![
            FixedProvider::sleeping("a", Duration::from_secs(5)),
            FixedProvider::sleeping("b", Duration::from_secs(5)),
        ];
        let audit = Arc::new(RecordingAudit::default());
        let engine = engine(config, providers).with_audit_logger(audit.clone());

        let err = engine.run(request()).await.unwrap_err();
        assert_eq!(err, RunConsensusError::EmptyResult(EmptyResultReason::AllProvidersTimedOut));
        assert_eq!(err.code(), "all_providers_timed_out");
        assert_eq!(*audit.events.lock(), vec!["consensus_failed"]);
    }

    #[tokio::test]
    async fn test_all_errors_reported_with_reason() {
        let providers: Vec<Arc<dyn Provider>> = vec![
            FixedProvider::failing("a", ProviderError::Protocol("garbage".into())),
            FixedProvider::failing(
                "b",
                ProviderError::Http {
                    status: 502,
                    message: "bad gateway".into(),
                },
            ),
        ];
        let engine = engine(EngineConfig::default(), providers);

        let err = engine.run(request()).await.unwrap_err();
        assert_eq!(err, RunConsensusError::EmptyResult(EmptyResultReason::AllProvidersErrored));
    }

    #[tokio::test]
    async fn test_caller_rate_limit() {
        let mut config = EngineConfig::default();
        config.rate_limit.caller = RateLimitPolicy::new(60, 1);
        let engine = engine(config, paris_lyon());

        assert!(engine.run(request().with_caller("alice")).await.is_ok());
        let err = engine.run(request().with_caller("alice")).await.unwrap_err();
        assert!(matches!(err, RunConsensusError::RateLimited { retry_after_ms } if retry_after_ms > 0));
        assert!(engine.run(request().with_caller("bob")).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_providers() {
        let engine = engine(EngineConfig::default(), Vec::new());
        assert_eq!(engine.run(request()).await.unwrap_err(), RunConsensusError::NoProviders);
    }

    #[tokio::test]
    async fn test_invalid_query() {
        assert!(matches!(
            ConsensusRequest::new("   "),
            Err(RunConsensusError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_second_run_is_served_from_cache() {
        let config = EngineConfig::default().with_cache_secret("secret");
        let alpha = FixedProvider::answering("alpha", "Paris is the capital of France.");
        let providers: Vec<Arc<dyn Provider>> = vec![
            alpha.clone(),
            FixedProvider::answering("bravo", "Paris is the capital of France."),
        ];
        let cache = Arc::new(MemoryCache::default());
        let audit = Arc::new(RecordingAudit::default());
        let engine = engine(config, providers)
            .with_cache(cache.clone())
            .with_audit_logger(audit.clone());

        let first = engine.run(request()).await.unwrap();
        assert_eq!(first.meta.cache, CacheStatus::Miss);

        engine.flush_cache_writes().await;
        assert_eq!(cache.entries.lock().len(), 1);

        let second = engine.run(request()).await.unwrap();
        assert_eq!(second.meta.cache, CacheStatus::Hit);
        assert_eq!(second.final_answer, first.final_answer);
        assert_eq!(alpha.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*audit.events.lock(), vec!["consensus_completed", "cache_hit"]);

        let bypass = engine.run(request().without_cache()).await.unwrap();
        assert_eq!(bypass.meta.cache, CacheStatus::Disabled);
        assert_eq!(alpha.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = EngineConfig::default()
            .with_deadlines(Duration::from_secs(10), Duration::from_secs(5));
        assert!(ConsensusEngine::new(config, paris_lyon()).is_err());
    }

    #[tokio::test]
    async fn test_denied_providers_count_as_rate_limited() {
        let mut config = EngineConfig::default();
        config.rate_limit.provider = RateLimitPolicy::new(60, 1);
        let providers: Vec<Arc<dyn Provider>> =
            vec![FixedProvider::answering("solo", "Paris is the capital of France.")];
        let engine = engine(config, providers);

        assert!(engine.run(request()).await.is_ok());
        let err = engine.run(request()).await.unwrap_err();
        assert_eq!(err, RunConsensusError::EmptyResult(EmptyResultReason::AllProvidersRateLimited));
    }

    #[tokio::test]
    async fn test_stalled_cache_read_falls_through_to_providers() {
        let mut config = EngineConfig::default().with_cache_secret("secret");
        config.cache.read_timeout = Duration::from_millis(20);
        let alpha = FixedProvider::answering("alpha", "Paris is the capital of France.");
        let providers: Vec<Arc<dyn Provider>> = vec![
            alpha.clone(),
            FixedProvider::answering("bravo", "Paris is the capital of France."),
        ];
        let engine = engine(config, providers).with_cache(Arc::new(StalledCache::default()));

        let started = Instant::now();
        let response = engine.run(request()).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(response.final_answer, "Paris is the capital of France.");
        assert_eq!(response.meta.cache, CacheStatus::Miss);
        assert_eq!(alpha.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_flush_waits_for_pending_cache_writes() {
        let mut config = EngineConfig::default().with_cache_secret("secret");
        let cache = Arc::new(StalledCache::default());
        config.cache.read_timeout = Duration::from_millis(20);
        let engine = engine(config, paris_lyon()).with_cache(cache.clone());

        engine.run(request()).await.unwrap();
        engine.run(request().with_context("geography")).await.unwrap();
        engine.flush_cache_writes().await;
        assert_eq!(cache.writes.load(Ordering::SeqCst), 2);

        // Nothing left to wait for
        engine.flush_cache_writes().await;
    }
}
