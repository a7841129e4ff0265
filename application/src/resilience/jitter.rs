//! Randomized backoff jitter
//!
//! The RNG is injected so backoff timing is reproducible under test and
//! varied in production.

use std::time::Duration;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng, rngs::SmallRng};

pub trait JitterSource: Send + Sync {
    /// Extra delay in `[0, base * ratio]`
    fn jitter(&self, base: Duration, ratio: f64) -> Duration;
}

/// Jitter drawn from a seedable [`SmallRng`]
pub struct SeededJitter {
    rng: Mutex<SmallRng>,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }
}

impl JitterSource for SeededJitter {
    fn jitter(&self, base: Duration, ratio: f64) -> Duration {
        let span = base.as_secs_f64() * ratio.clamp(0.0, 1.0);
        if span <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.rng.lock().gen_range(0.0..=span))
    }
}

/// Always zero
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn jitter(&self, _base: Duration, _ratio: f64) -> Duration {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let a = SeededJitter::new(42);
        let b = SeededJitter::new(42);
        let base = Duration::from_secs(60);
        for _ in 0..5 {
            assert_eq!(a.jitter(base, 0.1), b.jitter(base, 0.1));
        }
    }

    #[test]
    fn test_jitter_is_bounded() {
        let jitter = SeededJitter::new(7);
        let base = Duration::from_secs(10);
        for _ in 0..100 {
            assert!(jitter.jitter(base, 0.2) <= Duration::from_secs(2));
        }
        assert_eq!(jitter.jitter(base, 0.0), Duration::ZERO);
        assert_eq!(NoJitter.jitter(base, 1.0), Duration::ZERO);
    }
}
