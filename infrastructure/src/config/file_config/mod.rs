//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! [`FileConfig::to_engine_config`] turns them into a validated
//! [`EngineConfig`].

mod engine;
mod output;
mod providers;

pub use engine::{
    FileCacheBackend, FileCacheConfig, FileCircuitBreakerConfig, FileConcurrencyConfig,
    FileConsensusConfig, FileDeadlinesConfig, FileRateLimit, FileRateLimitConfig,
    FileValidationConfig,
};
pub use output::FileOutputConfig;
pub use providers::FileProviderConfig;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use verity_application::config::{ConcurrencySettings, ConfigError, ConsensusSettings, EngineConfig};
use verity_domain::{DomainError, ProviderId};

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("invalid provider id '{id}': {source}")]
    InvalidProviderId {
        id: String,
        #[source]
        source: DomainError,
    },

    #[error("provider '{0}' is declared more than once")]
    DuplicateProvider(String),

    #[error("provider '{0}' has no endpoint")]
    EmptyEndpoint(String),

    #[error(transparent)]
    Engine(#[from] ConfigError),
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub rate_limit: FileRateLimitConfig,
    pub circuit_breaker: FileCircuitBreakerConfig,
    pub concurrency: FileConcurrencyConfig,
    pub deadlines: FileDeadlinesConfig,
    pub cache: FileCacheConfig,
    pub validation: FileValidationConfig,
    pub consensus: FileConsensusConfig,
    pub output: FileOutputConfig,
    /// `[[providers]]` tables
    pub providers: Vec<FileProviderConfig>,
}

impl FileConfig {
    /// Build and validate the engine configuration.
    pub fn to_engine_config(&self) -> Result<EngineConfig, ConfigValidationError> {
        let mut reliability = BTreeMap::new();
        for (id, provider) in self.provider_ids()?.into_iter().zip(&self.providers) {
            if let Some(value) = provider.reliability {
                reliability.insert(id, value);
            }
        }

        let config = EngineConfig {
            rate_limit: self.rate_limit.to_settings(),
            circuit_breaker: self.circuit_breaker.to_settings(),
            concurrency: ConcurrencySettings {
                max_in_flight: self.concurrency.max_in_flight,
            },
            deadlines: self.deadlines.to_settings(),
            cache: self.cache.to_settings(),
            validation: self.validation.to_settings(),
            consensus: ConsensusSettings {
                min_sources: self.consensus.min_sources,
                policy: self.consensus.policy.clone(),
                reliability,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Parsed provider ids in declaration order.
    ///
    /// Rejects blank ids, duplicates and providers without an endpoint.
    pub fn provider_ids(&self) -> Result<Vec<ProviderId>, ConfigValidationError> {
        let mut seen = BTreeSet::new();
        let mut ids = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let id = ProviderId::new(&provider.id).map_err(|source| {
                ConfigValidationError::InvalidProviderId {
                    id: provider.id.clone(),
                    source,
                }
            })?;
            if !seen.insert(id.clone()) {
                return Err(ConfigValidationError::DuplicateProvider(id.to_string()));
            }
            if provider.endpoint.trim().is_empty() {
                return Err(ConfigValidationError::EmptyEndpoint(id.to_string()));
            }
            ids.push(id);
        }
        Ok(ids)
    }

    /// Copy safe to print: the cache secret is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.cache.secret.is_some() {
            copy.cache.secret = Some("<redacted>".to_string());
        }
        copy
    }
}
