//! Resilience primitives shared across requests.
//!
//! - [`RateLimiter`]: dual-window (burst bucket + per-minute counter) limiter
//! - [`CircuitBreaker`]: per-provider closed/open/half-open breaker
//! - [`ConcurrencyGate`]: bound on in-flight provider calls
//! - [`ResilienceRegistry`]: owns all of the above for one engine

pub mod circuit_breaker;
pub mod concurrency;
pub mod jitter;
pub mod rate_limiter;
pub mod registry;

pub use circuit_breaker::{BreakerDecision, CircuitBreaker, CircuitState};
pub use concurrency::{ConcurrencyGate, GateClosed, GatePermit};
pub use jitter::{JitterSource, NoJitter, SeededJitter};
pub use rate_limiter::{RateDecision, RateLimiter};
pub use registry::ResilienceRegistry;
