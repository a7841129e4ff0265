//! Dual-window rate limiter
//!
//! Each key has a token bucket (capacity `burst`, refilled continuously at
//! `per_minute / 60` tokens per second) and a fixed one-minute counter. A
//! call is admitted only when both have room. The minute counter allows
//! `max(per_minute, burst)` calls so a full burst is never rejected by the
//! window alone.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::RateLimitPolicy;

const WINDOW: Duration = Duration::from_secs(60);

/// Outcome of [`RateLimiter::try_acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Wait before the next call can succeed; zero when allowed
    pub retry_after: Duration,
}

impl RateDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after: Duration::ZERO,
        }
    }

    fn deny(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after,
        }
    }

    pub fn retry_after_ms(&self) -> u64 {
        u64::try_from(self.retry_after.as_millis()).unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Clone)]
struct KeyState {
    tokens: f64,
    last_refill: Instant,
    window_start: Instant,
    window_count: u32,
}

/// Rate limiter keyed by caller or provider id.
///
/// Tracks at most `max_keys` keys; unknown keys beyond that are denied.
pub struct RateLimiter {
    keys: DashMap<String, KeyState>,
    policy: RateLimitPolicy,
    max_keys: usize,
}

impl RateLimiter {
    const DEFAULT_MAX_KEYS: usize = 100_000;

    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_max_keys(policy, Self::DEFAULT_MAX_KEYS)
    }

    pub fn with_max_keys(policy: RateLimitPolicy, max_keys: usize) -> Self {
        Self {
            keys: DashMap::new(),
            policy,
            max_keys,
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    fn refill_per_sec(&self) -> f64 {
        f64::from(self.policy.per_minute) / WINDOW.as_secs_f64()
    }

    fn window_cap(&self) -> u32 {
        self.policy.per_minute.max(self.policy.burst)
    }

    fn fresh_state(&self, now: Instant) -> KeyState {
        KeyState {
            tokens: f64::from(self.policy.burst),
            last_refill: now,
            window_start: now,
            window_count: 0,
        }
    }

    /// Try to take one slot for `key` at `now`.
    pub fn try_acquire(&self, key: &str, now: Instant) -> RateDecision {
        if !self.keys.contains_key(key) && self.keys.len() >= self.max_keys {
            return RateDecision::deny(WINDOW);
        }

        let mut state = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| self.fresh_state(now));
        self.decide(&mut state, now, true)
    }

    /// Report what [`try_acquire`](Self::try_acquire) would decide without
    /// taking a slot or registering `key`.
    pub fn check(&self, key: &str, now: Instant) -> RateDecision {
        let mut state = match self.keys.get(key) {
            Some(state) => KeyState::clone(&state),
            None if self.keys.len() >= self.max_keys => return RateDecision::deny(WINDOW),
            None => self.fresh_state(now),
        };
        self.decide(&mut state, now, false)
    }

    fn decide(&self, state: &mut KeyState, now: Instant, consume: bool) -> RateDecision {
        let burst = f64::from(self.policy.burst);
        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_per_sec()).min(burst);
        state.last_refill = now.max(state.last_refill);

        if now.saturating_duration_since(state.window_start) >= WINDOW {
            state.window_start = now;
            state.window_count = 0;
        }

        let has_token = state.tokens >= 1.0;
        let window_open = state.window_count < self.window_cap();
        if has_token && window_open {
            if consume {
                state.tokens -= 1.0;
                state.window_count += 1;
            }
            return RateDecision::allow();
        }

        let burst_wait = if has_token {
            Duration::ZERO
        } else if self.refill_per_sec() > 0.0 {
            Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec())
        } else {
            WINDOW
        };
        let window_wait = if window_open {
            Duration::ZERO
        } else {
            (state.window_start + WINDOW).saturating_duration_since(now)
        };

        RateDecision::deny(burst_wait.max(window_wait).max(Duration::from_millis(1)))
    }

    /// Drop keys idle for longer than `ttl`; returns how many were removed.
    pub fn evict_idle(&self, now: Instant, ttl: Duration) -> usize {
        let before = self.keys.len();
        self.keys
            .retain(|_, state| now.saturating_duration_since(state.last_refill) < ttl);
        before - self.keys.len()
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}
