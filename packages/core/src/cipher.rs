//! Symmetric cipher for values at rest.
//!
//! # Format
//!
//! - Key: 32 bytes, base64-encoded in `ENCRYPTION_KEY`. URL-safe and
//!   standard alphabets are both accepted, with or without padding.
//! - Token: URL-safe base64 of `nonce (24 bytes) || ciphertext || tag`,
//!   produced by XChaCha20-Poly1305 with a fresh random nonce per value.
//!
//! # Example
//!
//! ```
//! use keystash::cipher::KeyCipher;
//!
//! # fn main() -> Result<(), keystash::error::CryptoError> {
//! let key = KeyCipher::generate_key();
//! let cipher = KeyCipher::from_base64(&key)?;
//!
//! let token = cipher.encrypt("sk-test-123")?;
//! assert_eq!(cipher.decrypt(&token)?, "sk-test-123");
//! # Ok(())
//! # }
//! ```

use crate::error::CryptoError;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use std::fmt;

/// Length of the raw key material.
pub const KEY_LEN: usize = 32;

const NONCE_LEN: usize = 24;

pub struct KeyCipher {
    aead: XChaCha20Poly1305,
}

impl KeyCipher {
    /// Build a cipher from base64 key material.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = decode_key(encoded)?;
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::KeyLength {
                expected: KEY_LEN,
                actual: bytes.len(),
            });
        }

        let aead = XChaCha20Poly1305::new_from_slice(&bytes).map_err(|_| {
            CryptoError::KeyLength {
                expected: KEY_LEN,
                actual: bytes.len(),
            }
        })?;

        Ok(Self { aead })
    }

    /// Build a cipher from the configured key, if any.
    pub fn from_config(encoded: Option<&str>) -> Result<Self, CryptoError> {
        match encoded {
            Some(key) => Self::from_base64(key),
            None => Err(CryptoError::MissingKey),
        }
    }

    /// Fresh random key, URL-safe base64 encoded, suitable for `ENCRYPTION_KEY`.
    pub fn generate_key() -> String {
        let key = XChaCha20Poly1305::generate_key(&mut OsRng);
        URL_SAFE.encode(key)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .aead
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        let mut token = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        token.extend_from_slice(&nonce);
        token.extend_from_slice(&ciphertext);

        Ok(URL_SAFE.encode(token))
    }

    pub fn decrypt(&self, token: &str) -> Result<String, CryptoError> {
        let raw = URL_SAFE
            .decode(token.trim())
            .map_err(|_| CryptoError::CiphertextEncoding)?;

        if raw.len() < NONCE_LEN {
            return Err(CryptoError::Truncated);
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .aead
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)
    }
}

impl fmt::Debug for KeyCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCipher").finish_non_exhaustive()
    }
}

fn decode_key(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    let encoded = encoded.trim();

    URL_SAFE
        .decode(encoded)
        .or_else(|_| STANDARD.decode(encoded))
        .or_else(|_| URL_SAFE_NO_PAD.decode(encoded))
        .or_else(|_| STANDARD_NO_PAD.decode(encoded))
        .map_err(CryptoError::from)
}
