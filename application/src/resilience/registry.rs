//! Shared resilience state owned by one engine instance
//!
//! Holds the caller, global and per-provider rate limiters, one circuit
//! breaker per provider and the concurrency gate. Nothing here is global:
//! two engines never share state unless they share a registry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use verity_domain::{ProviderErrorKind, ProviderId};

use super::circuit_breaker::{BreakerDecision, CircuitBreaker, CircuitState};
use super::concurrency::ConcurrencyGate;
use super::jitter::{JitterSource, SeededJitter};
use super::rate_limiter::{RateDecision, RateLimiter};
use crate::config::{CircuitBreakerSettings, EngineConfig};

const GLOBAL_KEY: &str = "*";

pub struct ResilienceRegistry {
    caller_limiter: RateLimiter,
    global_limiter: RateLimiter,
    provider_limiter: RateLimiter,
    breakers: DashMap<ProviderId, Arc<CircuitBreaker>>,
    breaker_settings: CircuitBreakerSettings,
    jitter: Arc<dyn JitterSource>,
    gate: ConcurrencyGate,
}

impl ResilienceRegistry {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_jitter(config, Arc::new(SeededJitter::from_entropy()))
    }

    pub fn with_jitter(config: &EngineConfig, jitter: Arc<dyn JitterSource>) -> Self {
        Self {
            caller_limiter: RateLimiter::new(config.rate_limit.caller),
            global_limiter: RateLimiter::new(config.rate_limit.global),
            provider_limiter: RateLimiter::new(config.rate_limit.provider),
            breakers: DashMap::new(),
            breaker_settings: config.circuit_breaker.clone(),
            jitter,
            gate: ConcurrencyGate::new(config.concurrency.max_in_flight),
        }
    }

    /// Admit one request from `caller` through the per-caller and global limits.
    ///
    /// A request turned away by the global limit costs the caller nothing.
    /// Two requests racing for the last global slot can still both spend a
    /// caller token.
    pub fn admit_caller(&self, caller: &str, now: Instant) -> RateDecision {
        let global = self.global_limiter.check(GLOBAL_KEY, now);
        if !global.allowed {
            return global;
        }
        let per_caller = self.caller_limiter.try_acquire(caller, now);
        if !per_caller.allowed {
            return per_caller;
        }
        self.global_limiter.try_acquire(GLOBAL_KEY, now)
    }

    /// Check a provider's rate limit, then its circuit breaker.
    pub fn admit_provider(&self, provider: &ProviderId, now: Instant) -> Result<(), ProviderErrorKind> {
        if !self.provider_limiter.try_acquire(provider.as_str(), now).allowed {
            return Err(ProviderErrorKind::RateLimited);
        }
        match self.breaker(provider).check(now) {
            BreakerDecision::Allowed => Ok(()),
            BreakerDecision::Probe => {
                tracing::debug!(provider = %provider, "probing provider");
                Ok(())
            }
            BreakerDecision::Rejected { .. } => Err(ProviderErrorKind::CircuitOpen),
        }
    }

    pub fn record_outcome(&self, provider: &ProviderId, success: bool, now: Instant) {
        let breaker = self.breaker(provider);
        if success {
            breaker.record_success();
        } else {
            breaker.record_failure(now);
        }
    }

    pub fn breaker(&self, provider: &ProviderId) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(provider) {
            return Arc::clone(existing.value());
        }
        let entry = self.breakers.entry(provider.clone()).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(
                self.breaker_settings.clone(),
                Arc::clone(&self.jitter),
            ))
        });
        Arc::clone(entry.value())
    }

    pub fn breaker_state(&self, provider: &ProviderId) -> CircuitState {
        self.breakers
            .get(provider)
            .map(|b| b.state())
            .unwrap_or(CircuitState::Closed)
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Forget rate-limit keys idle for longer than `ttl`
    pub fn evict_idle(&self, now: Instant, ttl: Duration) -> usize {
        self.caller_limiter.evict_idle(now, ttl)
            + self.global_limiter.evict_idle(now, ttl)
            + self.provider_limiter.evict_idle(now, ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitPolicy;
    use crate::resilience::jitter::NoJitter;

    fn id(s: &str) -> ProviderId {
        ProviderId::new(s).unwrap()
    }

    fn registry(config: EngineConfig) -> ResilienceRegistry {
        ResilienceRegistry::with_jitter(&config, Arc::new(NoJitter))
    }

    #[test]
    fn test_caller_limit_is_per_caller() {
        let mut config = EngineConfig::default();
        config.rate_limit.caller = RateLimitPolicy::new(60, 1);
        let registry = registry(config);
        let now = Instant::now();

        assert!(registry.admit_caller("alice", now).allowed);
        let denied = registry.admit_caller("alice", now);
        assert!(!denied.allowed);
        assert!(denied.retry_after_ms() > 0);
        assert!(registry.admit_caller("bob", now).allowed);
    }

    #[test]
    fn test_global_limit_spans_callers() {
        let mut config = EngineConfig::default();
        config.rate_limit.global = RateLimitPolicy::new(60, 2);
        let registry = registry(config);
        let now = Instant::now();

        assert!(registry.admit_caller("a", now).allowed);
        assert!(registry.admit_caller("b", now).allowed);
        assert!(!registry.admit_caller("c", now).allowed);
    }

    #[test]
    fn test_global_denial_keeps_caller_tokens() {
        let mut config = EngineConfig::default();
        // Caller bucket refills once a minute, the global one every second
        config.rate_limit.caller = RateLimitPolicy::new(1, 1);
        config.rate_limit.global = RateLimitPolicy::new(60, 1);
        let registry = registry(config);
        let now = Instant::now();

        assert!(registry.admit_caller("a", now).allowed);
        for _ in 0..3 {
            assert!(!registry.admit_caller("b", now).allowed);
        }

        // Once the global bucket refills, "b" still has its single token
        let later = now + Duration::from_secs(1);
        assert!(registry.admit_caller("b", later).allowed);
    }

    #[test]
    fn test_open_breaker_denies_provider() {
        let registry = registry(EngineConfig::default());
        let now = Instant::now();
        let p = id("flaky");

        for _ in 0..3 {
            assert!(registry.admit_provider(&p, now).is_ok());
            registry.record_outcome(&p, false, now);
        }
        assert_eq!(registry.breaker_state(&p), CircuitState::Open);
        assert_eq!(registry.admit_provider(&p, now), Err(ProviderErrorKind::CircuitOpen));
        assert!(registry.admit_provider(&id("healthy"), now).is_ok());
    }

    #[test]
    fn test_provider_rate_limit() {
        let mut config = EngineConfig::default();
        config.rate_limit.provider = RateLimitPolicy::new(60, 1);
        let registry = registry(config);
        let now = Instant::now();
        let p = id("busy");

        assert!(registry.admit_provider(&p, now).is_ok());
        assert_eq!(registry.admit_provider(&p, now), Err(ProviderErrorKind::RateLimited));
    }
}
