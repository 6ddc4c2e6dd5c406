// Keystash - Encrypted Document Module
//
// Reads and writes the on-disk keys file: a flat JSON object mapping
// credential names to ciphertext tokens.

use crate::error::StoreError;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Default location of the keys file, relative to the working directory.
pub const DEFAULT_KEYS_FILE: &str = "secrets/encrypted_keys.json";

/// Name → ciphertext entries, kept sorted so rewrites are stable.
pub type Entries = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct EncryptedDocument {
    path: PathBuf,
}

impl EncryptedDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load entries, surfacing read and parse errors.
    ///
    /// A missing file is not an error and yields no entries.
    pub fn try_load(&self) -> Result<Entries, StoreError> {
        if !self.path.exists() {
            return Ok(Entries::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|source| StoreError::Persistence {
            path: self.path.clone(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| StoreError::Document {
            path: self.path.clone(),
            source,
        })
    }

    /// Load entries, treating an unreadable or corrupt file as empty.
    pub fn load(&self) -> Entries {
        match self.try_load() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "treating keys file as empty");
                Entries::new()
            }
        }
    }

    /// Rewrite the whole document.
    ///
    /// Writes to a sibling temp file and renames it over the target, so a
    /// reader sees either the previous document or the new one.
    pub fn save(&self, entries: &Entries) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let persistence = |source: io::Error| StoreError::Persistence {
            path: self.path.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(persistence)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(persistence)?;
        serde_json::to_writer_pretty(&mut tmp, entries).map_err(|source| {
            StoreError::Document {
                path: self.path.clone(),
                source,
            }
        })?;
        tmp.write_all(b"\n").map_err(persistence)?;
        tmp.as_file().sync_all().map_err(persistence)?;
        tmp.persist(&self.path).map_err(|e| persistence(e.error))?;

        debug!(path = %self.path.display(), entries = entries.len(), "keys file written");
        Ok(())
    }
}
