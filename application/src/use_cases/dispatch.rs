//! Provider dispatch use case
//!
//! Fans one query out to every provider concurrently, isolating failures
//! per provider and bounding the whole round by the request deadline.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use verity_domain::{ProviderErrorKind, ProviderId, ProviderResponse};

use crate::ports::progress::ProgressNotifier;
use crate::ports::provider::{InferenceRequest, Provider};
use crate::resilience::ResilienceRegistry;

/// Result of probing one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub provider: ProviderId,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub latency_ms: u64,
}

pub struct ProviderDispatcher {
    registry: Arc<ResilienceRegistry>,
    provider_timeout: Duration,
    min_sources: usize,
}

impl ProviderDispatcher {
    pub fn new(registry: Arc<ResilienceRegistry>, provider_timeout: Duration, min_sources: usize) -> Self {
        Self {
            registry,
            provider_timeout,
            min_sources,
        }
    }

    /// Call every primary provider, then the fallbacks if fewer than
    /// `min_sources` primaries succeeded.
    ///
    /// `request.deadline` is the global request deadline; each call gets the
    /// earlier of that and `now + provider_timeout`. Providers still running
    /// at the global deadline are recorded as timeouts.
    pub async fn dispatch(
        &self,
        request: &InferenceRequest,
        providers: &[Arc<dyn Provider>],
        progress: &dyn ProgressNotifier,
    ) -> BTreeMap<ProviderId, ProviderResponse> {
        let (fallbacks, primaries): (Vec<_>, Vec<_>) =
            providers.iter().cloned().partition(|p| p.is_fallback());

        if primaries.is_empty() {
            return self.round(request, &fallbacks, progress).await;
        }

        let mut results = self.round(request, &primaries, progress).await;
        let succeeded = results.values().filter(|r| r.is_success()).count();

        if succeeded < self.min_sources && !fallbacks.is_empty() {
            if Instant::now() >= request.deadline {
                warn!("No time left for fallback providers");
            } else {
                info!(
                    "Only {}/{} sources succeeded, calling {} fallback provider(s)",
                    succeeded,
                    self.min_sources,
                    fallbacks.len()
                );
                let extra = self.round(request, &fallbacks, progress).await;
                for (id, response) in extra {
                    results.entry(id).or_insert(response);
                }
            }
        }

        results
    }

    async fn round(
        &self,
        request: &InferenceRequest,
        providers: &[Arc<dyn Provider>],
        progress: &dyn ProgressNotifier,
    ) -> BTreeMap<ProviderId, ProviderResponse> {
        let started = Instant::now();
        let mut join_set = JoinSet::new();
        let mut pending: BTreeSet<ProviderId> = BTreeSet::new();

        for provider in providers {
            let id = provider.id().clone();
            if !pending.insert(id.clone()) {
                warn!("Duplicate provider {} ignored", id);
                continue;
            }

            let registry = Arc::clone(&self.registry);
            let provider = Arc::clone(provider);
            let call = request.with_deadline(request.deadline.min(started + self.provider_timeout));

            join_set.spawn(async move { call_provider(registry, provider, call).await });
        }

        let mut results = BTreeMap::new();
        let deadline = tokio::time::Instant::from_std(request.deadline);

        loop {
            match tokio::time::timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(Ok(response))) => {
                    pending.remove(&response.provider_id);
                    progress.on_provider_complete(&response.provider_id, response.is_success());
                    results.insert(response.provider_id.clone(), response);
                }
                Ok(Some(Err(e))) => {
                    warn!("Provider task join error: {}", e);
                }
                Ok(None) => break,
                Err(_) => {
                    warn!("Request deadline reached with {} provider(s) pending", pending.len());
                    join_set.abort_all();
                    break;
                }
            }
        }

        let elapsed = elapsed_ms(started);
        for id in pending {
            warn!("Provider {} timed out", id);
            self.registry.record_outcome(&id, false, Instant::now());
            progress.on_provider_complete(&id, false);
            results.insert(
                id.clone(),
                ProviderResponse::failure(id, ProviderErrorKind::Timeout, elapsed),
            );
        }

        results
    }

    /// Probe every provider's health concurrently.
    pub async fn health(&self, providers: &[Arc<dyn Provider>]) -> Vec<HealthReport> {
        let mut join_set = JoinSet::new();
        for provider in providers {
            let provider = Arc::clone(provider);
            let timeout = self.provider_timeout;
            join_set.spawn(async move {
                let started = Instant::now();
                let outcome = tokio::time::timeout(timeout, provider.health_check()).await;
                let detail = match outcome {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(_) => Some("timed out".to_string()),
                };
                HealthReport {
                    provider: provider.id().clone(),
                    healthy: detail.is_none(),
                    detail,
                    latency_ms: elapsed_ms(started),
                }
            });
        }

        let mut reports = Vec::new();
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => warn!("Health check task failed: {}", e),
            }
        }
        reports.sort_by(|a, b| a.provider.cmp(&b.provider));
        reports
    }
}

/// One provider call: admission, gate, the call itself, breaker update.
///
/// Never panics outward; a panicking provider is recorded as a protocol error.
async fn call_provider(
    registry: Arc<ResilienceRegistry>,
    provider: Arc<dyn Provider>,
    request: InferenceRequest,
) -> ProviderResponse {
    let id = provider.id().clone();
    let started = Instant::now();
    let deadline = tokio::time::Instant::from_std(request.deadline);

    let _permit = match tokio::time::timeout_at(deadline, registry.gate().acquire()).await {
        Ok(Ok(permit)) => permit,
        Ok(Err(e)) => {
            return ProviderResponse::failure(id, ProviderErrorKind::Protocol(e.to_string()), 0);
        }
        Err(_) => {
            debug!("Provider {} timed out waiting for a concurrency slot", id);
            return ProviderResponse::failure(id, ProviderErrorKind::Timeout, elapsed_ms(started));
        }
    };

    if let Err(denial) = registry.admit_provider(&id, Instant::now()) {
        debug!("Provider {} skipped: {}", id, denial);
        return ProviderResponse::failure(id, denial, elapsed_ms(started));
    }

    let call = AssertUnwindSafe(tokio::time::timeout_at(deadline, provider.infer(&request)));
    let response = match call.catch_unwind().await {
        Ok(Ok(Ok(output))) => {
            let confidence = output.confidence();
            ProviderResponse::success(id.clone(), output.text, elapsed_ms(started))
                .with_confidence(confidence)
        }
        Ok(Ok(Err(e))) => {
            warn!("Provider {} failed: {}", id, e);
            ProviderResponse::failure(id.clone(), e.kind(), elapsed_ms(started))
        }
        Ok(Err(_)) => {
            warn!("Provider {} exceeded its deadline", id);
            ProviderResponse::failure(id.clone(), ProviderErrorKind::Timeout, elapsed_ms(started))
        }
        Err(_) => {
            warn!("Provider {} panicked", id);
            ProviderResponse::failure(
                id.clone(),
                ProviderErrorKind::Protocol("provider panicked".to_string()),
                elapsed_ms(started),
            )
        }
    };

    let usable = response.is_success();
    if !usable && response.error.is_none() {
        debug!("Provider {} returned blank text", id);
    }
    registry.record_outcome(&id, usable, Instant::now());
    response
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::ports::progress::NoProgress;
    use crate::ports::provider::{ProviderError, ProviderOutput};
    use crate::resilience::{CircuitState, NoJitter};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Answer(&'static str),
        Sleep(Duration),
        Fail,
        Panic,
    }

    struct ScriptedProvider {
        id: ProviderId,
        behavior: Behavior,
        fallback: bool,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(id: &str, behavior: Behavior) -> Self {
            Self {
                id: ProviderId::new(id).unwrap(),
                behavior,
                fallback: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn fallback(mut self) -> Self {
            self.fallback = true;
            self
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn id(&self) -> &ProviderId {
            &self.id
        }

        fn is_fallback(&self) -> bool {
            self.fallback
        }

        async fn infer(&self, _request: &InferenceRequest) -> Result<ProviderOutput, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Answer(text) => {
                    Ok(ProviderOutput::new(*text).with_metadata(json!({"confidence": 0.9})))
                }
                Behavior::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(ProviderOutput::new("too late"))
                }
                Behavior::Fail => Err(ProviderError::Http {
                    status: 500,
                    message: "boom".into(),
                }),
                Behavior::Panic => panic!("provider bug"),
            }
        }

        async fn health_check(&self) -> Result<(), ProviderError> {
            match self.behavior {
                Behavior::Fail => Err(ProviderError::Protocol("unhealthy".into())),
                _ => Ok(()),
            }
        }
    }

    fn dispatcher(config: &EngineConfig) -> (ProviderDispatcher, Arc<ResilienceRegistry>) {
        let registry = Arc::new(ResilienceRegistry::with_jitter(config, Arc::new(NoJitter)));
        let dispatcher = ProviderDispatcher::new(
            Arc::clone(&registry),
            config.deadlines.provider,
            config.consensus.min_sources,
        );
        (dispatcher, registry)
    }

    fn request(within: Duration) -> InferenceRequest {
        InferenceRequest::new("What is the capital of France?", Instant::now() + within)
    }

    fn arc(p: ScriptedProvider) -> Arc<dyn Provider> {
        Arc::new(p)
    }

    #[tokio::test]
    async fn test_partial_failure_two_timeouts() {
        let config = EngineConfig::default()
            .with_deadlines(Duration::from_millis(100), Duration::from_millis(300));
        let (dispatcher, _) = dispatcher(&config);
        let providers = vec![
            arc(ScriptedProvider::new("a", Behavior::Answer("Paris is the capital of France."))),
            arc(ScriptedProvider::new("b", Behavior::Answer("Paris is the capital of France."))),
            arc(ScriptedProvider::new("c", Behavior::Answer("Lyon is the capital of France."))),
            arc(ScriptedProvider::new("d", Behavior::Sleep(Duration::from_secs(5)))),
            arc(ScriptedProvider::new("e", Behavior::Sleep(Duration::from_secs(5)))),
        ];

        let results = dispatcher
            .dispatch(&request(config.deadlines.request), &providers, &NoProgress)
            .await;

        assert_eq!(results.len(), 5);
        assert_eq!(results.values().filter(|r| r.is_success()).count(), 3);
        assert_eq!(results["d"].error, Some(ProviderErrorKind::Timeout));
        assert_eq!(results["e"].error, Some(ProviderErrorKind::Timeout));
        assert_eq!(results["a"].confidence, Some(0.9));
    }

    #[tokio::test]
    async fn test_global_deadline_cuts_off_slow_providers() {
        let config = EngineConfig::default();
        let (dispatcher, _) = dispatcher(&config);
        let providers = vec![
            arc(ScriptedProvider::new("fast", Behavior::Answer("An answer here."))),
            arc(ScriptedProvider::new("slow", Behavior::Sleep(Duration::from_secs(10)))),
        ];

        let started = Instant::now();
        let results = dispatcher
            .dispatch(&request(Duration::from_millis(150)), &providers, &NoProgress)
            .await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(results["fast"].is_success());
        assert_eq!(results["slow"].error, Some(ProviderErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_failures_and_panics_are_isolated() {
        let config = EngineConfig::default();
        let (dispatcher, _) = dispatcher(&config);
        let providers = vec![
            arc(ScriptedProvider::new("ok", Behavior::Answer("Fine answer text."))),
            arc(ScriptedProvider::new("err", Behavior::Fail)),
            arc(ScriptedProvider::new("bug", Behavior::Panic)),
        ];

        let results = dispatcher
            .dispatch(&request(Duration::from_secs(2)), &providers, &NoProgress)
            .await;

        assert!(results["ok"].is_success());
        assert_eq!(results["err"].error.as_ref().map(|e| e.code()), Some("http"));
        assert_eq!(results["bug"].error.as_ref().map(|e| e.code()), Some("protocol"));
    }

    #[tokio::test]
    async fn test_open_circuit_short_circuits_provider() {
        let config = EngineConfig::default();
        let (dispatcher, registry) = dispatcher(&config);
        let flaky = Arc::new(ScriptedProvider::new("flaky", Behavior::Fail));
        let providers: Vec<Arc<dyn Provider>> = vec![flaky.clone()];

        for _ in 0..3 {
            dispatcher
                .dispatch(&request(Duration::from_secs(1)), &providers, &NoProgress)
                .await;
        }
        assert_eq!(registry.breaker_state(flaky.id()), CircuitState::Open);

        let results = dispatcher
            .dispatch(&request(Duration::from_secs(1)), &providers, &NoProgress)
            .await;
        assert_eq!(results["flaky"].error, Some(ProviderErrorKind::CircuitOpen));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fallbacks_only_when_short_of_sources() {
        let config = EngineConfig::default().with_min_sources(2);
        let (dispatcher, _) = dispatcher(&config);

        let backup = Arc::new(ScriptedProvider::new("backup", Behavior::Answer("Backup answer text.")).fallback());
        let providers: Vec<Arc<dyn Provider>> = vec![
            arc(ScriptedProvider::new("a", Behavior::Answer("Primary answer text."))),
            arc(ScriptedProvider::new("b", Behavior::Answer("Primary answer text."))),
            backup.clone(),
        ];
        let results = dispatcher
            .dispatch(&request(Duration::from_secs(1)), &providers, &NoProgress)
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(backup.calls.load(Ordering::SeqCst), 0);

        let providers: Vec<Arc<dyn Provider>> = vec![
            arc(ScriptedProvider::new("a", Behavior::Answer("Primary answer text."))),
            arc(ScriptedProvider::new("b", Behavior::Fail)),
            backup.clone(),
        ];
        let results = dispatcher
            .dispatch(&request(Duration::from_secs(1)), &providers, &NoProgress)
            .await;
        assert_eq!(results.len(), 3);
        assert!(results["backup"].is_success());
    }

    #[tokio::test]
    async fn test_health_reports_each_provider() {
        let config = EngineConfig::default();
        let (dispatcher, _) = dispatcher(&config);
        let providers = vec![
            arc(ScriptedProvider::new("up", Behavior::Answer("x"))),
            arc(ScriptedProvider::new("down", Behavior::Fail)),
        ];

        let reports = dispatcher.health(&providers).await;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].provider.as_str(), "down");
        assert!(!reports[0].healthy);
        assert_eq!(reports[0].detail.as_deref(), Some("Protocol error: unhealthy"));
        assert!(reports[1].healthy);
    }
}
