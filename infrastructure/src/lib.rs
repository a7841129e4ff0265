//! Infrastructure layer for verity
//!
//! Adapters that implement the ports defined in the application layer:
//! configuration file loading, the encrypted result cache and its
//! backends, the JSONL audit trail, and (with the `http` feature) the
//! JSON-over-HTTP provider and the web evidence source.

pub mod cache;
pub mod config;
pub mod logging;
#[cfg(feature = "http")]
pub mod providers;
#[cfg(feature = "http")]
pub mod web;

// Re-export commonly used types
pub use cache::{CacheSealer, EncryptedResultCache, FsCacheBackend, InMemoryCacheBackend};
pub use config::{
    ConfigLoader, ConfigValidationError, FileCacheBackend, FileCacheConfig, FileConfig,
    FileOutputConfig, FileProviderConfig,
};
pub use logging::JsonlAuditLogger;
#[cfg(feature = "http")]
pub use providers::{HttpProvider, ProviderBuildError, build_providers};
#[cfg(feature = "http")]
pub use web::HttpEvidenceSource;
