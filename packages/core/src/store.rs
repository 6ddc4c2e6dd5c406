//! Secrets store for provider API keys.
//!
//! # Resolution Order
//!
//! [`SecretsStore::get`] asks, in order: the in-memory cache, the process
//! environment, then the encrypted keys file. The first hit wins and is
//! cached for the rest of the process lifetime.
//!
//! # Guarantees
//!
//! - **Plaintext never persisted**: values are encrypted before they reach disk
//! - **Cache coherence**: the cache is only changed under the write lock, so
//!   it always agrees with the latest `set`/`delete`
//! - **No escaping errors**: every failure is returned as an outcome value
//!
//! # Concurrency
//!
//! The store is `Send + Sync`. `set` and `delete` serialise their full
//! cache/load/encrypt/save cycle on a write lock, lookups that miss the cache
//! take the same lock, and the keys file is replaced by atomic rename. Several processes writing the same keys file is not
//! supported.
//!
//! # Example
//!
//! ```no_run
//! use keystash::config::StoreConfig;
//! use keystash::store::SecretsStore;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = StoreConfig::from_env()?;
//! let store = SecretsStore::new(&config);
//!
//! store.set("OPENAI_API_KEY", "sk-test-123");
//! assert_eq!(store.get("OPENAI_API_KEY").value(), Some("sk-test-123"));
//! # Ok(())
//! # }
//! ```

use crate::cipher::KeyCipher;
use crate::config::StoreConfig;
use crate::document::{EncryptedDocument, Entries};
use crate::env::{ReadEnv, SystemEnv};
use crate::error::StoreError;
use crate::resolver::{
    Cache, CacheResolver, EncryptedFileResolver, EnvResolver, Resolution, Resolver, Source,
};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// A resolved credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub name: String,
    pub value: String,
    pub source: Source,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Outcome of [`SecretsStore::get`].
#[derive(Debug)]
pub enum Lookup {
    Found(Credential),
    NotFound,
    /// A source holds the name but could not produce a value.
    Failed(StoreError),
}

impl Lookup {
    /// The value, if found. Failures read as absent.
    pub fn value(&self) -> Option<&str> {
        match self {
            Lookup::Found(credential) => Some(credential.value.as_str()),
            Lookup::NotFound | Lookup::Failed(_) => None,
        }
    }

    pub fn into_value(self) -> Option<String> {
        match self {
            Lookup::Found(credential) => Some(credential.value),
            Lookup::NotFound | Lookup::Failed(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// Outcome of [`SecretsStore::set`].
#[derive(Debug)]
pub enum WriteOutcome {
    /// Cached and written to the keys file.
    Persisted,
    /// Visible in this process only; the keys file was not updated.
    CachedOnly(StoreError),
    /// Nothing changed: the cipher could not be initialised.
    Rejected(StoreError),
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WriteOutcome::Persisted)
    }

    pub fn error(&self) -> Option<&StoreError> {
        match self {
            WriteOutcome::Persisted => None,
            WriteOutcome::CachedOnly(e) | WriteOutcome::Rejected(e) => Some(e),
        }
    }
}

/// Outcome of [`SecretsStore::delete`].
#[derive(Debug)]
pub enum DeleteOutcome {
    Removed,
    /// The keys file never held the name.
    Absent,
    Failed(StoreError),
}

impl DeleteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeleteOutcome::Removed | DeleteOutcome::Absent)
    }
}

pub struct SecretsStore {
    cache: Arc<Cache>,
    resolvers: Vec<Box<dyn Resolver>>,
    env: Arc<dyn ReadEnv + Send + Sync>,
    document: EncryptedDocument,
    encryption_key: Option<String>,
    env_suffix: String,
    write_lock: Mutex<()>,
}

impl SecretsStore {
    /// Build a store reading the real process environment.
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_env(config, Arc::new(SystemEnv))
    }

    /// Build a store over an explicit environment source.
    pub fn with_env(config: &StoreConfig, env: Arc<dyn ReadEnv + Send + Sync>) -> Self {
        let cache = Arc::new(Cache::new());
        let document = EncryptedDocument::new(&config.keys_file);

        let resolvers: Vec<Box<dyn Resolver>> = vec![
            Box::new(CacheResolver::new(Arc::clone(&cache))),
            Box::new(EnvResolver::new(Arc::clone(&env))),
            Box::new(EncryptedFileResolver::new(
                document.clone(),
                config.encryption_key.clone(),
            )),
        ];

        Self {
            cache,
            resolvers,
            env,
            document,
            encryption_key: config.encryption_key.clone(),
            env_suffix: config.env_suffix.clone(),
            write_lock: Mutex::new(()),
        }
    }

    /// Append a resolver consulted after the built-in ones.
    pub fn push_resolver(&mut self, resolver: Box<dyn Resolver>) {
        self.resolvers.push(resolver);
    }

    pub fn keys_file(&self) -> &Path {
        self.document.path()
    }

    /// Drop every cached value, as a process restart would.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Resolve `name`.
    ///
    /// A cache hit is served without locking. Anything else resolves under
    /// the write lock, so a value read from disk can never be cached after
    /// a newer `set` or `delete` of the same name.
    pub fn get(&self, name: &str) -> Lookup {
        if let Some(value) = self.cache.get(name) {
            debug!(credential = name, source = %Source::Cache, "credential resolved");
            return Lookup::Found(Credential {
                name: name.to_string(),
                value,
                source: Source::Cache,
            });
        }

        let _guard = self.lock_writes();
        let mut failure = None;

        for resolver in &self.resolvers {
            let source = resolver.source();

            match resolver.resolve(name) {
                Resolution::Hit(value) => {
                    if source != Source::Cache {
                        self.cache.insert(name, &value);
                    }
                    debug!(credential = name, %source, "credential resolved");
                    return Lookup::Found(Credential {
                        name: name.to_string(),
                        value,
                        source,
                    });
                }
                Resolution::Miss => {}
                Resolution::Failed(e) => {
                    warn!(credential = name, %source, error = %e, "credential could not be resolved");
                    failure.get_or_insert(e);
                }
            }
        }

        match failure {
            Some(e) => Lookup::Failed(e),
            None => Lookup::NotFound,
        }
    }

    pub fn set(&self, name: &str, value: &str) -> WriteOutcome {
        let cipher = match KeyCipher::from_config(self.encryption_key.as_deref()) {
            Ok(cipher) => cipher,
            Err(e) => {
                warn!(credential = name, error = %e, "refusing to store credential");
                return WriteOutcome::Rejected(e.into());
            }
        };

        let _guard = self.lock_writes();
        self.cache.insert(name, value);

        let mut entries = match self.load_for_write() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(credential = name, error = %e, "credential cached but not persisted");
                return WriteOutcome::CachedOnly(e);
            }
        };

        let token = match cipher.encrypt(value) {
            Ok(token) => token,
            Err(e) => {
                warn!(credential = name, error = %e, "credential cached but not persisted");
                return WriteOutcome::CachedOnly(e.into());
            }
        };
        entries.insert(name.to_string(), token);

        match self.document.save(&entries) {
            Ok(()) => {
                debug!(credential = name, "credential stored");
                WriteOutcome::Persisted
            }
            Err(e) => {
                warn!(credential = name, error = %e, "credential cached but not persisted");
                WriteOutcome::CachedOnly(e)
            }
        }
    }

    pub fn delete(&self, name: &str) -> DeleteOutcome {
        let _guard = self.lock_writes();
        self.cache.remove(name);

        let mut entries = match self.load_for_write() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(credential = name, error = %e, "failed to read keys file");
                return DeleteOutcome::Failed(e);
            }
        };

        if entries.remove(name).is_none() {
            debug!(credential = name, "credential not in keys file");
            return DeleteOutcome::Absent;
        }

        match self.document.save(&entries) {
            Ok(()) => {
                debug!(credential = name, "credential deleted");
                DeleteOutcome::Removed
            }
            Err(e) => {
                warn!(credential = name, error = %e, "failed to rewrite keys file");
                DeleteOutcome::Failed(e)
            }
        }
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current entries for a rewrite. A corrupt document is replaced; an
    /// unreadable one is left alone.
    fn load_for_write(&self) -> Result<Entries, StoreError> {
        match self.document.try_load() {
            Ok(entries) => Ok(entries),
            Err(e @ StoreError::Document { .. }) => {
                warn!(error = %e, "replacing corrupt keys file");
                Ok(Entries::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Names from the environment (by suffix) and the keys file, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self
            .env
            .var_names()
            .into_iter()
            .filter(|name| name.ends_with(&self.env_suffix))
            .collect();

        names.extend(self.document.load().into_keys());
        names.into_iter().collect()
    }
}

impl fmt::Debug for SecretsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretsStore")
            .field("keys_file", &self.document.path())
            .field("cache", &self.cache)
            .field("env_suffix", &self.env_suffix)
            .field("resolvers", &self.resolvers.len())
            .finish_non_exhaustive()
    }
}
