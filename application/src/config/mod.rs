//! Application-level configuration.
//!
//! - [`EngineConfig`]: every tunable of the consensus pipeline, validated
//!   at engine construction

pub mod engine_config;

pub use engine_config::{
    CacheSettings, CircuitBreakerSettings, ConcurrencySettings, ConfigError, ConsensusSettings,
    DeadlineSettings, EngineConfig, RateLimitPolicy, RateLimitSettings, ValidationSettings,
};
