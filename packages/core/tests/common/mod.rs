//! Common testing utilities for Keystash integration tests.

use keystash::cipher::KeyCipher;
use keystash::config::StoreConfig;
use keystash::env::MapEnv;
use keystash::store::SecretsStore;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Test context that owns a temporary keys file location and key.
pub struct TestContext {
    /// Path to temporary directory
    pub temp_path: PathBuf,
    /// Base64 key used by every store built from this context
    pub encryption_key: String,
    /// The temporary directory (kept to prevent early deletion)
    _temp_dir: TempDir,
}

impl TestContext {
    /// Create a new test context with a temporary directory and fresh key.
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = TempDir::new()?;
        let temp_path = temp_dir.path().to_path_buf();

        Ok(Self {
            temp_path,
            encryption_key: KeyCipher::generate_key(),
            _temp_dir: temp_dir,
        })
    }

    /// Location of the keys file inside the temp directory.
    pub fn keys_file(&self) -> PathBuf {
        self.temp_path.join("secrets").join("encrypted_keys.json")
    }

    pub fn config(&self) -> StoreConfig {
        StoreConfig {
            keys_file: self.keys_file(),
            encryption_key: Some(self.encryption_key.clone()),
            ..StoreConfig::default()
        }
    }

    /// A store with an empty environment.
    pub fn store(&self) -> SecretsStore {
        self.store_with_env(MapEnv::new())
    }

    pub fn store_with_env(&self, env: MapEnv) -> SecretsStore {
        SecretsStore::with_env(&self.config(), Arc::new(env))
    }

    /// Raw contents of the keys file.
    #[allow(dead_code)]
    pub fn read_keys_file(&self) -> anyhow::Result<String> {
        Ok(fs::read_to_string(self.keys_file())?)
    }

    /// Parsed keys file as a JSON object.
    #[allow(dead_code)]
    pub fn keys_json(&self) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
        let content = self.read_keys_file()?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Overwrite the keys file with arbitrary content.
    #[allow(dead_code)]
    pub fn write_keys_file(&self, content: &str) -> anyhow::Result<()> {
        let path = self.keys_file();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_context_paths() {
        let ctx = TestContext::new().unwrap();

        assert!(ctx.keys_file().starts_with(&ctx.temp_path));
        assert!(!ctx.keys_file().exists());
    }

    #[test]
    fn test_test_context_write_keys_file() {
        let ctx = TestContext::new().unwrap();
        ctx.write_keys_file("{}").unwrap();

        assert!(ctx.keys_json().unwrap().is_empty());
    }
}
