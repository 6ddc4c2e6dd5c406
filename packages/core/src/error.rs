//! Error taxonomy for the secrets store.
//!
//! Nothing in here is raised to the HTTP layer. The store folds these into
//! [`crate::store::Lookup`], [`crate::store::WriteOutcome`] and
//! [`crate::store::DeleteOutcome`] so callers keep the failure kind
//! without having to handle a panic or a bare `false`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Bad key material or ciphertext that does not authenticate.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption key is not configured (set ENCRYPTION_KEY)")]
    MissingKey,

    #[error("encryption key is not valid base64: {0}")]
    KeyEncoding(#[from] base64::DecodeError),

    #[error("encryption key must decode to {expected} bytes, got {actual}")]
    KeyLength { expected: usize, actual: usize },

    #[error("ciphertext is not valid base64")]
    CiphertextEncoding,

    #[error("ciphertext is too short to contain a nonce")]
    Truncated,

    #[error("failed to encrypt value")]
    Encrypt,

    #[error("decryption failed (wrong key or corrupted ciphertext)")]
    Decrypt,

    #[error("decrypted value is not valid UTF-8")]
    Utf8,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("failed to access keys file {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("keys file {} is not a valid document: {source}", path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Coarse failure class, for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Crypto,
    Persistence,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Crypto(_) => ErrorKind::Crypto,
            StoreError::Persistence { .. } | StoreError::Document { .. } => {
                ErrorKind::Persistence
            }
        }
    }
}
