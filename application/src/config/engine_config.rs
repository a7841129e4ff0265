//! Engine configuration.
//!
//! [`EngineConfig`] groups every tunable of the consensus pipeline into
//! explicit, defaulted structs. [`EngineConfig::validate`] is called by the
//! engine at construction so a bad combination fails before any request.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;
use verity_domain::{MAX_WEB_DOCUMENTS, ProviderId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error(
        "provider deadline ({provider_ms}ms) must be shorter than the request deadline ({request_ms}ms)"
    )]
    DeadlineOrder { provider_ms: u128, request_ms: u128 },

    #[error("circuit breaker max_cooldown must not be shorter than cooldown")]
    CooldownOrder,

    #[error("jitter_ratio must be within [0, 1], got {0}")]
    JitterRatio(f64),

    #[error("cache is enabled but no secret is configured")]
    MissingCacheSecret,

    #[error("cache namespace must not be empty")]
    EmptyNamespace,

    #[error("reliability for {provider} must be within [0, 1], got {value}")]
    Reliability { provider: ProviderId, value: f64 },

    #[error("validation retry_timeout must not exceed page_timeout")]
    RetryTimeoutOrder,
}

/// Token budget for one rate-limited key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub per_minute: u32,
    pub burst: u32,
}

impl RateLimitPolicy {
    pub const fn new(per_minute: u32, burst: u32) -> Self {
        Self { per_minute, burst }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Per calling client
    pub caller: RateLimitPolicy,
    /// Across all callers of this engine
    pub global: RateLimitPolicy,
    /// Per provider
    pub provider: RateLimitPolicy,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            caller: RateLimitPolicy::new(30, 5),
            global: RateLimitPolicy::new(600, 50),
            provider: RateLimitPolicy::new(120, 20),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Initial open window
    pub cooldown: Duration,
    /// Upper bound for the backed-off window
    pub max_cooldown: Duration,
    /// Extra random delay, as a fraction of the backed-off window
    pub jitter_ratio: f64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(300),
            jitter_ratio: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencySettings {
    /// Provider calls in flight across all requests
    pub max_in_flight: usize,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self { max_in_flight: 16 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineSettings {
    pub provider: Duration,
    pub request: Duration,
}

impl Default for DeadlineSettings {
    fn default() -> Self {
        Self {
            provider: Duration::from_secs(20),
            request: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl: Duration,
    /// Reads sit on the request path and give up after this long
    pub read_timeout: Duration,
    pub namespace: String,
    pub secret: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: Duration::from_secs(3600),
            read_timeout: Duration::from_millis(250),
            namespace: "verity".to_string(),
            secret: None,
        }
    }
}

impl std::fmt::Debug for CacheSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheSettings")
            .field("enabled", &self.enabled)
            .field("ttl", &self.ttl)
            .field("read_timeout", &self.read_timeout)
            .field("namespace", &self.namespace)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationSettings {
    pub enabled: bool,
    /// Pages retrieved per request (never more than three)
    pub max_documents: usize,
    pub page_timeout: Duration,
    /// Timeout of the single retry after a failed fetch
    pub retry_timeout: Duration,
    /// Search hits requested before sanitization
    pub search_results: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_documents: MAX_WEB_DOCUMENTS,
            page_timeout: Duration::from_secs(5),
            retry_timeout: Duration::from_secs(2),
            search_results: 6,
        }
    }
}

impl ValidationSettings {
    /// `max_documents` with the hard cap applied
    pub fn document_limit(&self) -> usize {
        self.max_documents.min(MAX_WEB_DOCUMENTS)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusSettings {
    /// Successful primaries required before fallbacks are skipped
    pub min_sources: usize,
    /// Reported in the response metadata
    pub policy: String,
    /// Externally supplied trust per provider, in `[0, 1]`
    pub reliability: BTreeMap<ProviderId, f64>,
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            min_sources: 2,
            policy: "majority-trust".to_string(),
            reliability: BTreeMap::new(),
        }
    }
}

/// Complete configuration of a consensus engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub rate_limit: RateLimitSettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub concurrency: ConcurrencySettings,
    pub deadlines: DeadlineSettings,
    pub cache: CacheSettings,
    pub validation: ValidationSettings,
    pub consensus: ConsensusSettings,
}

impl EngineConfig {
    // ==================== Builder Methods ====================

    pub fn with_deadlines(mut self, provider: Duration, request: Duration) -> Self {
        self.deadlines = DeadlineSettings { provider, request };
        self
    }

    pub fn with_min_sources(mut self, min_sources: usize) -> Self {
        self.consensus.min_sources = min_sources;
        self
    }

    pub fn with_reliability(mut self, provider: ProviderId, value: f64) -> Self {
        self.consensus.reliability.insert(provider, value);
        self
    }

    pub fn with_cache_secret(mut self, secret: impl Into<String>) -> Self {
        self.cache.enabled = true;
        self.cache.secret = Some(secret.into());
        self
    }

    pub fn without_validation(mut self) -> Self {
        self.validation.enabled = false;
        self
    }

    // ==================== Validation ====================

    /// Reject zero limits, inverted deadlines and a cache without a secret.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("rate_limit.caller.per_minute", self.rate_limit.caller.per_minute),
            ("rate_limit.caller.burst", self.rate_limit.caller.burst),
            ("rate_limit.global.per_minute", self.rate_limit.global.per_minute),
            ("rate_limit.global.burst", self.rate_limit.global.burst),
            ("rate_limit.provider.per_minute", self.rate_limit.provider.per_minute),
            ("rate_limit.provider.burst", self.rate_limit.provider.burst),
            ("circuit_breaker.failure_threshold", self.circuit_breaker.failure_threshold),
        ];
        if let Some((field, _)) = limits.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Zero(*field));
        }

        let durations = [
            ("circuit_breaker.cooldown", self.circuit_breaker.cooldown),
            ("deadlines.provider", self.deadlines.provider),
            ("deadlines.request", self.deadlines.request),
            ("cache.ttl", self.cache.ttl),
            ("cache.read_timeout", self.cache.read_timeout),
            ("validation.page_timeout", self.validation.page_timeout),
            ("validation.retry_timeout", self.validation.retry_timeout),
        ];
        if let Some((field, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::Zero(*field));
        }

        if self.concurrency.max_in_flight == 0 {
            return Err(ConfigError::Zero("concurrency.max_in_flight"));
        }
        if self.consensus.min_sources == 0 {
            return Err(ConfigError::Zero("consensus.min_sources"));
        }

        if self.deadlines.provider >= self.deadlines.request {
            return Err(ConfigError::DeadlineOrder {
                provider_ms: self.deadlines.provider.as_millis(),
                request_ms: self.deadlines.request.as_millis(),
            });
        }

        let breaker = &self.circuit_breaker;
        if breaker.max_cooldown < breaker.cooldown {
            return Err(ConfigError::CooldownOrder);
        }
        if !(0.0..=1.0).contains(&breaker.jitter_ratio) {
            return Err(ConfigError::JitterRatio(breaker.jitter_ratio));
        }

        if self.cache.namespace.trim().is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }
        if self.cache.enabled
            && self
                .cache
                .secret
                .as_deref()
                .is_none_or(|s| s.trim().is_empty())
        {
            return Err(ConfigError::MissingCacheSecret);
        }

        if self.validation.retry_timeout > self.validation.page_timeout {
            return Err(ConfigError::RetryTimeoutOrder);
        }

        for (provider, value) in &self.consensus.reliability {
            if !(0.0..=1.0).contains(value) {
                return Err(ConfigError::Reliability {
                    provider: provider.clone(),
                    value: *value,
                });
            }
        }

        Ok(())
    }
}
