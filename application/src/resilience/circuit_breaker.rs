//! Per-provider circuit breaker
//!
//! `Closed -> Open` after `failure_threshold` consecutive failures.
//! `Open -> HalfOpen` once the cool-down has elapsed; exactly one probe is
//! let through. A successful probe closes the circuit, a failed one reopens
//! it with the cool-down doubled (capped at `max_cooldown`) plus jitter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::jitter::JitterSource;
use crate::config::CircuitBreakerSettings;

/// Observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Answer to "may I call this provider now?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerDecision {
    /// Circuit closed, normal call
    Allowed,
    /// Cool-down elapsed; this call is the single probe
    Probe,
    /// Short-circuited
    Rejected { retry_after: Duration },
}

impl BreakerDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, BreakerDecision::Rejected { .. })
    }
}

#[derive(Debug)]
enum Inner {
    Closed { consecutive_failures: u32 },
    Open { until: Instant, cooldown: Duration },
    HalfOpen { cooldown: Duration },
}

pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    settings: CircuitBreakerSettings,
    jitter: Arc<dyn JitterSource>,
}

impl CircuitBreaker {
    pub fn new(settings: CircuitBreakerSettings, jitter: Arc<dyn JitterSource>) -> Self {
        Self {
            inner: Mutex::new(Inner::Closed {
                consecutive_failures: 0,
            }),
            settings,
            jitter,
        }
    }

    pub fn state(&self) -> CircuitState {
        match *self.inner.lock() {
            Inner::Closed { .. } => CircuitState::Closed,
            Inner::Open { .. } => CircuitState::Open,
            Inner::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Decide whether a call may proceed at `now`.
    ///
    /// The transition to half-open happens here, so the first caller after
    /// the cool-down receives [`BreakerDecision::Probe`] and every other
    /// caller is rejected until the probe reports back.
    pub fn check(&self, now: Instant) -> BreakerDecision {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match *inner {
            Inner::Closed { .. } => BreakerDecision::Allowed,
            Inner::Open { until, cooldown } => {
                if now >= until {
                    *inner = Inner::HalfOpen { cooldown };
                    tracing::info!("circuit breaker half-open, sending probe");
                    BreakerDecision::Probe
                } else {
                    BreakerDecision::Rejected {
                        retry_after: until - now,
                    }
                }
            }
            Inner::HalfOpen { .. } => BreakerDecision::Rejected {
                retry_after: self.settings.cooldown,
            },
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if !matches!(*inner, Inner::Closed { .. }) {
            tracing::info!("circuit breaker closed after successful probe");
        }
        *inner = Inner::Closed {
            consecutive_failures: 0,
        };
    }

    pub fn record_failure(&self, now: Instant) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match *inner {
            Inner::Closed {
                consecutive_failures,
            } => {
                let failures = consecutive_failures + 1;
                if failures >= self.settings.failure_threshold {
                    tracing::warn!(failures, "circuit breaker opened");
                    *inner = Inner::Open {
                        until: now + self.settings.cooldown,
                        cooldown: self.settings.cooldown,
                    };
                } else {
                    *inner = Inner::Closed {
                        consecutive_failures: failures,
                    };
                }
            }
            Inner::HalfOpen { cooldown } => {
                let next = (cooldown * 2).min(self.settings.max_cooldown);
                let wait = next + self.jitter.jitter(next, self.settings.jitter_ratio);
                tracing::warn!(cooldown_ms = wait.as_millis() as u64, "probe failed, circuit breaker reopened");
                *inner = Inner::Open {
                    until: now + wait,
                    cooldown: next,
                };
            }
            // Late result of a call admitted before the circuit opened
            Inner::Open { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::jitter::{NoJitter, SeededJitter};

    fn settings() -> CircuitBreakerSettings {
        CircuitBreakerSettings {
            failure_threshold: 3,
            cooldown: Duration::from_secs(10),
            max_cooldown: Duration::from_secs(25),
            jitter_ratio: 0.1,
        }
    }

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(settings(), Arc::new(NoJitter))
    }

    #[test]
    fn test_opens_after_threshold() {
        let cb = breaker();
        let now = Instant::now();

        cb.record_failure(now);
        cb.record_failure(now);
        assert_eq!(cb.check(now), BreakerDecision::Allowed);

        cb.record_failure(now);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(matches!(
            cb.check(now + Duration::from_secs(1)),
            BreakerDecision::Rejected { retry_after } if retry_after == Duration::from_secs(9)
        ));
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker();
        let now = Instant::now();

        cb.record_failure(now);
        cb.record_failure(now);
        cb.record_success();
        cb.record_failure(now);
        cb.record_failure(now);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_exactly_one_probe_after_cooldown() {
        let cb = breaker();
        let now = Instant::now();
        for _ in 0..3 {
            cb.record_failure(now);
        }

        let after = now + Duration::from_secs(10);
        assert_eq!(cb.check(after), BreakerDecision::Probe);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(!cb.check(after).is_allowed());
        assert!(!cb.check(after + Duration::from_secs(1)).is_allowed());

        cb.record_success();
        assert_eq!(cb.check(after), BreakerDecision::Allowed);
    }

    #[test]
    fn test_failed_probe_backs_off_with_cap() {
        let cb = breaker();
        let now = Instant::now();
        for _ in 0..3 {
            cb.record_failure(now);
        }

        // first probe fails: cooldown 10s -> 20s
        let t1 = now + Duration::from_secs(10);
        assert_eq!(cb.check(t1), BreakerDecision::Probe);
        cb.record_failure(t1);
        assert!(!cb.check(t1 + Duration::from_secs(19)).is_allowed());

        // second probe fails: 20s -> 40s capped at 25s
        let t2 = t1 + Duration::from_secs(20);
        assert_eq!(cb.check(t2), BreakerDecision::Probe);
        cb.record_failure(t2);
        assert!(!cb.check(t2 + Duration::from_secs(24)).is_allowed());
        assert_eq!(cb.check(t2 + Duration::from_secs(25)), BreakerDecision::Probe);
    }

    #[test]
    fn test_jitter_extends_reopen_window() {
        let cb = CircuitBreaker::new(settings(), Arc::new(SeededJitter::new(1)));
        let now = Instant::now();
        for _ in 0..3 {
            cb.record_failure(now);
        }
        let t1 = now + Duration::from_secs(10);
        assert_eq!(cb.check(t1), BreakerDecision::Probe);
        cb.record_failure(t1);

        // 20s backoff plus at most 2s of jitter
        assert!(!cb.check(t1 + Duration::from_millis(19_999)).is_allowed());
        assert_eq!(cb.check(t1 + Duration::from_secs(22)), BreakerDecision::Probe);
    }

    #[test]
    fn test_late_failure_while_open_is_ignored() {
        let cb = breaker();
        let now = Instant::now();
        for _ in 0..3 {
            cb.record_failure(now);
        }
        cb.record_failure(now + Duration::from_secs(5));
        assert_eq!(cb.check(now + Duration::from_secs(10)), BreakerDecision::Probe);
    }
}
