//! Resolver strategies for credential lookup.
//!
//! A lookup walks an ordered list of resolvers and stops at the first hit.
//! The default order is:
//!
//! 1. [`CacheResolver`] - plaintext values already seen by this process
//! 2. [`EnvResolver`] - process environment, as an override source
//! 3. [`EncryptedFileResolver`] - the keys file, decrypted with the active key

use crate::cipher::KeyCipher;
use crate::document::EncryptedDocument;
use crate::env::ReadEnv;
use crate::error::StoreError;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Where a credential value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Environment,
    EncryptedFile,
    /// A resolver plugged in by the embedding application.
    Custom(&'static str),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Cache => f.write_str("cache"),
            Source::Environment => f.write_str("environment"),
            Source::EncryptedFile => f.write_str("encrypted-file"),
            Source::Custom(name) => f.write_str(name),
        }
    }
}

/// Result of asking a single resolver for a name.
#[derive(Debug)]
pub enum Resolution {
    Hit(String),
    Miss,
    Failed(StoreError),
}

pub trait Resolver: Send + Sync {
    fn source(&self) -> Source;

    fn resolve(&self, name: &str) -> Resolution;
}

/// Process-lifetime map of decrypted values.
#[derive(Default)]
pub struct Cache {
    entries: Mutex<HashMap<String, String>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    pub fn insert(&self, name: &str, value: &str) {
        self.lock().insert(name.to_string(), value.to_string());
    }

    pub fn remove(&self, name: &str) -> bool {
        self.lock().remove(name).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache").field("len", &self.len()).finish()
    }
}

pub struct CacheResolver {
    cache: Arc<Cache>,
}

impl CacheResolver {
    pub fn new(cache: Arc<Cache>) -> Self {
        Self { cache }
    }
}

impl Resolver for CacheResolver {
    fn source(&self) -> Source {
        Source::Cache
    }

    fn resolve(&self, name: &str) -> Resolution {
        match self.cache.get(name) {
            Some(value) => Resolution::Hit(value),
            None => Resolution::Miss,
        }
    }
}

pub struct EnvResolver {
    env: Arc<dyn ReadEnv + Send + Sync>,
}

impl EnvResolver {
    pub fn new(env: Arc<dyn ReadEnv + Send + Sync>) -> Self {
        Self { env }
    }
}

impl Resolver for EnvResolver {
    fn source(&self) -> Source {
        Source::Environment
    }

    fn resolve(&self, name: &str) -> Resolution {
        match self.env.var(name) {
            Ok(value) => Resolution::Hit(value),
            Err(_) => Resolution::Miss,
        }
    }
}

pub struct EncryptedFileResolver {
    document: EncryptedDocument,
    encryption_key: Option<String>,
}

impl EncryptedFileResolver {
    pub fn new(document: EncryptedDocument, encryption_key: Option<String>) -> Self {
        Self {
            document,
            encryption_key,
        }
    }
}

impl Resolver for EncryptedFileResolver {
    fn source(&self) -> Source {
        Source::EncryptedFile
    }

    fn resolve(&self, name: &str) -> Resolution {
        let entries = self.document.load();
        let Some(token) = entries.get(name) else {
            return Resolution::Miss;
        };

        let cipher = match KeyCipher::from_config(self.encryption_key.as_deref()) {
            Ok(cipher) => cipher,
            Err(e) => return Resolution::Failed(e.into()),
        };

        match cipher.decrypt(token) {
            Ok(value) => Resolution::Hit(value),
            Err(e) => Resolution::Failed(e.into()),
        }
    }
}
