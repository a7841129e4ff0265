//! Authenticated sealing of cache payloads.
//!
//! Layout of a sealed entry:
//!
//! ```text
//! nonce (12 bytes) || AES-256-GCM ciphertext+tag || SHA-256(ciphertext+tag) (32 bytes)
//! ```
//!
//! The plaintext is the DEFLATE-compressed JSON encoding of the value.
//! The checksum is verified before any decryption is attempted.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::hkdf::{HKDF_SHA256, Salt};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use verity_application::CacheError;

const KEY_SALT: &[u8] = b"verity-cache-v1";
const KEY_INFO: &[&[u8]] = &[b"verity result cache"];
const CHECKSUM_LEN: usize = 32;

/// Upper bound on the decompressed size of one entry
pub const MAX_PLAINTEXT_BYTES: u64 = 8 * 1024 * 1024;

/// Seals and opens cache entries with a key derived from a shared secret
pub struct CacheSealer {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl CacheSealer {
    pub fn new(secret: &str) -> Result<Self, CacheError> {
        if secret.is_empty() {
            return Err(CacheError::Codec("cache secret is empty".to_string()));
        }

        let prk = Salt::new(HKDF_SHA256, KEY_SALT).extract(secret.as_bytes());
        let okm = prk
            .expand(KEY_INFO, &AES_256_GCM)
            .map_err(|_| CacheError::Codec("key derivation failed".to_string()))?;

        Ok(Self {
            key: LessSafeKey::new(UnboundKey::from(okm)),
            rng: SystemRandom::new(),
        })
    }

    /// Serialize, compress, encrypt and checksum `value`.
    ///
    /// `aad` is bound to the ciphertext; the same bytes must be passed to
    /// [`open`](Self::open).
    pub fn seal<T: Serialize>(&self, aad: &[u8], value: &T) -> Result<Vec<u8>, CacheError> {
        let json = serde_json::to_vec(value).map_err(|e| CacheError::Codec(e.to_string()))?;

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&json)
            .map_err(|e| CacheError::Codec(e.to_string()))?;
        let mut in_out = encoder
            .finish()
            .map_err(|e| CacheError::Codec(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CacheError::Codec("nonce generation failed".to_string()))?;

        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(aad),
                &mut in_out,
            )
            .map_err(|_| CacheError::Codec("encryption failed".to_string()))?;

        let checksum = Sha256::digest(&in_out);

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len() + CHECKSUM_LEN);
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);
        sealed.extend_from_slice(&checksum);
        Ok(sealed)
    }

    /// Reverse [`seal`](Self::seal). Any mismatch is an error, never a partial value.
    pub fn open<T: DeserializeOwned>(&self, aad: &[u8], sealed: &[u8]) -> Result<T, CacheError> {
        let tag_len = AES_256_GCM.tag_len();
        if sealed.len() < NONCE_LEN + tag_len + CHECKSUM_LEN {
            return Err(CacheError::Integrity);
        }

        let (nonce_bytes, rest) = sealed.split_at(NONCE_LEN);
        let (ciphertext, checksum) = rest.split_at(rest.len() - CHECKSUM_LEN);

        if Sha256::digest(ciphertext).as_slice() != checksum {
            return Err(CacheError::Integrity);
        }

        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| CacheError::Integrity)?;
        let mut in_out = ciphertext.to_vec();
        let compressed = self
            .key
            .open_in_place(nonce, Aad::from(aad), &mut in_out)
            .map_err(|_| CacheError::Integrity)?;

        let mut json = Vec::new();
        DeflateDecoder::new(&compressed[..])
            .take(MAX_PLAINTEXT_BYTES + 1)
            .read_to_end(&mut json)
            .map_err(|e| CacheError::Codec(e.to_string()))?;
        if json.len() as u64 > MAX_PLAINTEXT_BYTES {
            return Err(CacheError::Codec("entry exceeds size limit".to_string()));
        }

        serde_json::from_slice(&json).map_err(|e| CacheError::Codec(e.to_string()))
    }
}
