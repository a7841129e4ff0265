//! Result cache adapters.
//!
//! [`EncryptedResultCache`] implements the
//! [`ResultCache`](verity_application::ResultCache) port on top of any
//! byte-oriented [`CacheBackend`](verity_application::CacheBackend), sealing
//! every entry with [`CacheSealer`]. Two backends ship with the crate:
//!
//! - [`InMemoryCacheBackend`]: process-local, TTL-aware
//! - [`FsCacheBackend`]: one file per key under a directory

mod encrypted;
mod fs;
mod memory;
mod sealed;

pub use encrypted::EncryptedResultCache;
pub use fs::FsCacheBackend;
pub use memory::InMemoryCacheBackend;
pub use sealed::{CacheSealer, MAX_PLAINTEXT_BYTES};
