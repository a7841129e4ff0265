//! Application layer for verity
//!
//! Ports, the shared resilience primitives, engine configuration and the
//! use cases that drive the consensus pipeline. Depends only on the domain
//! layer.

pub mod config;
pub mod ports;
pub mod resilience;
pub mod use_cases;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig};
pub use ports::{
    audit_logger::{AuditEvent, AuditLogger, NoAuditLogger},
    cache::{CacheBackend, CacheError, NoCache, ResultCache},
    progress::{NoProgress, ProgressNotifier, Stage},
    provider::{ConversationTurn, InferenceRequest, Provider, ProviderError, ProviderOutput},
    web_evidence::WebEvidenceSource,
};
pub use resilience::{
    CircuitBreaker, CircuitState, ConcurrencyGate, JitterSource, NoJitter, RateDecision,
    RateLimiter, ResilienceRegistry, SeededJitter,
};
pub use use_cases::dispatch::{HealthReport, ProviderDispatcher};
pub use use_cases::gather_evidence::EvidenceGatherer;
pub use use_cases::run_consensus::{ConsensusEngine, ConsensusRequest, RunConsensusError};
