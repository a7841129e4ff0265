//! Directory-backed cache backend.
//!
//! Each key maps to `<dir>/<sha256(key)>.bin`. A file starts with the
//! expiry as 8-byte big-endian unix seconds, followed by the value.
//! Writes go to a temporary file and are renamed into place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;
use verity_application::{CacheBackend, CacheError};

const HEADER_LEN: usize = 8;

pub struct FsCacheBackend {
    dir: PathBuf,
    tmp_counter: AtomicU64,
}

impl FsCacheBackend {
    /// Use `dir` as the cache directory; it is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            tmp_counter: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.bin", hex::encode(Sha256::digest(key.as_bytes()))))
    }

    fn unix_now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

fn backend_err(e: std::io::Error) -> CacheError {
    CacheError::Backend(e.to_string())
}

#[async_trait]
impl CacheBackend for FsCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.entry_path(key);
        let mut bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(backend_err(e)),
        };

        let Some(header) = bytes.get(..HEADER_LEN) else {
            return Err(CacheError::Integrity);
        };
        let mut expiry = [0u8; HEADER_LEN];
        expiry.copy_from_slice(header);

        if u64::from_be_bytes(expiry) <= Self::unix_now() {
            debug!("Removing expired cache file {}", path.display());
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }

        bytes.drain(..HEADER_LEN);
        Ok(Some(bytes))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(backend_err)?;

        let expiry = Self::unix_now().saturating_add(ttl.as_secs());
        let mut file = Vec::with_capacity(HEADER_LEN + value.len());
        file.extend_from_slice(&expiry.to_be_bytes());
        file.extend_from_slice(&value);

        let path = self.entry_path(key);
        let tmp = path.with_extension(format!(
            "tmp.{}.{}",
            std::process::id(),
            self.tmp_counter.fetch_add(1, Ordering::Relaxed)
        ));

        tokio::fs::write(&tmp, &file).await.map_err(backend_err)?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(backend_err(e));
        }
        Ok(())
    }
}
