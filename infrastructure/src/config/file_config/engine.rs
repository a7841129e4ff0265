//! Pipeline tunables from TOML
//!
//! Durations are plain integers with the unit in the key name so they
//! can be set from environment variables. Defaults mirror
//! [`EngineConfig::default`] so an empty file changes nothing.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use verity_application::config::{
    CacheSettings, CircuitBreakerSettings, ConcurrencySettings, ConsensusSettings,
    DeadlineSettings, RateLimitPolicy, RateLimitSettings, ValidationSettings,
};

/// `{ per_minute, burst }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRateLimit {
    pub per_minute: u32,
    pub burst: u32,
}

impl From<RateLimitPolicy> for FileRateLimit {
    fn from(p: RateLimitPolicy) -> Self {
        Self {
            per_minute: p.per_minute,
            burst: p.burst,
        }
    }
}

impl From<FileRateLimit> for RateLimitPolicy {
    fn from(f: FileRateLimit) -> Self {
        RateLimitPolicy::new(f.per_minute, f.burst)
    }
}

/// `[rate_limit]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRateLimitConfig {
    pub caller: FileRateLimit,
    pub global: FileRateLimit,
    pub provider: FileRateLimit,
}

impl Default for FileRateLimitConfig {
    fn default() -> Self {
        let d = RateLimitSettings::default();
        Self {
            caller: d.caller.into(),
            global: d.global.into(),
            provider: d.provider.into(),
        }
    }
}

impl FileRateLimitConfig {
    pub fn to_settings(&self) -> RateLimitSettings {
        RateLimitSettings {
            caller: self.caller.into(),
            global: self.global.into(),
            provider: self.provider.into(),
        }
    }
}

/// `[circuit_breaker]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
    pub max_cooldown_secs: u64,
    pub jitter_ratio: f64,
}

impl Default for FileCircuitBreakerConfig {
    fn default() -> Self {
        let d = CircuitBreakerSettings::default();
        Self {
            failure_threshold: d.failure_threshold,
            cooldown_secs: d.cooldown.as_secs(),
            max_cooldown_secs: d.max_cooldown.as_secs(),
            jitter_ratio: d.jitter_ratio,
        }
    }
}

impl FileCircuitBreakerConfig {
    pub fn to_settings(&self) -> CircuitBreakerSettings {
        CircuitBreakerSettings {
            failure_threshold: self.failure_threshold,
            cooldown: Duration::from_secs(self.cooldown_secs),
            max_cooldown: Duration::from_secs(self.max_cooldown_secs),
            jitter_ratio: self.jitter_ratio,
        }
    }
}

/// `[concurrency]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConcurrencyConfig {
    pub max_in_flight: usize,
}

impl Default for FileConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_in_flight: ConcurrencySettings::default().max_in_flight,
        }
    }
}

/// `[deadlines]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDeadlinesConfig {
    pub provider_ms: u64,
    pub request_ms: u64,
}

impl Default for FileDeadlinesConfig {
    fn default() -> Self {
        let d = DeadlineSettings::default();
        Self {
            provider_ms: millis(d.provider),
            request_ms: millis(d.request),
        }
    }
}

impl FileDeadlinesConfig {
    pub fn to_settings(&self) -> DeadlineSettings {
        DeadlineSettings {
            provider: Duration::from_millis(self.provider_ms),
            request: Duration::from_millis(self.request_ms),
        }
    }
}

/// Where sealed cache entries are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCacheBackend {
    #[default]
    Memory,
    Fs,
}

/// `[cache]` section
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub read_timeout_ms: u64,
    pub namespace: String,
    /// Prefer `VERITY_CACHE__SECRET` over writing this into a file
    pub secret: Option<String>,
    pub backend: FileCacheBackend,
    /// Directory for the `fs` backend (default: user cache dir)
    pub dir: Option<PathBuf>,
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        let d = CacheSettings::default();
        Self {
            enabled: d.enabled,
            ttl_secs: d.ttl.as_secs(),
            read_timeout_ms: millis(d.read_timeout),
            namespace: d.namespace,
            secret: None,
            backend: FileCacheBackend::default(),
            dir: None,
        }
    }
}

impl std::fmt::Debug for FileCacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCacheConfig")
            .field("enabled", &self.enabled)
            .field("ttl_secs", &self.ttl_secs)
            .field("read_timeout_ms", &self.read_timeout_ms)
            .field("namespace", &self.namespace)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("backend", &self.backend)
            .field("dir", &self.dir)
            .finish()
    }
}

impl FileCacheConfig {
    pub fn to_settings(&self) -> CacheSettings {
        CacheSettings {
            enabled: self.enabled,
            ttl: Duration::from_secs(self.ttl_secs),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            namespace: self.namespace.clone(),
            secret: self.secret.clone(),
        }
    }
}

/// `[validation]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileValidationConfig {
    pub enabled: bool,
    pub max_documents: usize,
    pub page_timeout_ms: u64,
    pub retry_timeout_ms: u64,
    pub search_results: usize,
}

impl Default for FileValidationConfig {
    fn default() -> Self {
        let d = ValidationSettings::default();
        Self {
            enabled: d.enabled,
            max_documents: d.max_documents,
            page_timeout_ms: millis(d.page_timeout),
            retry_timeout_ms: millis(d.retry_timeout),
            search_results: d.search_results,
        }
    }
}

impl FileValidationConfig {
    pub fn to_settings(&self) -> ValidationSettings {
        ValidationSettings {
            enabled: self.enabled,
            max_documents: self.max_documents,
            page_timeout: Duration::from_millis(self.page_timeout_ms),
            retry_timeout: Duration::from_millis(self.retry_timeout_ms),
            search_results: self.search_results,
        }
    }
}

/// `[consensus]` section (per-provider reliability lives on `[[providers]]`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConsensusConfig {
    pub min_sources: usize,
    pub policy: String,
}

impl Default for FileConsensusConfig {
    fn default() -> Self {
        let d = ConsensusSettings::default();
        Self {
            min_sources: d.min_sources,
            policy: d.policy,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
