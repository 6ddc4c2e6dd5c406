// Keystash Configuration Module
//
// Builds the store configuration from defaults, an optional keystash.yaml
// and the process environment (later sources win).

use crate::cipher::KeyCipher;
use crate::document::DEFAULT_KEYS_FILE;
use crate::env::{ReadEnv, SystemEnv};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "keystash.yaml";

/// Suffix marking environment variables that count as credentials in `list`.
pub const DEFAULT_ENV_SUFFIX: &str = "_API_KEY";

pub const KEYS_FILE_VAR: &str = "KEYS_FILE";
pub const ENCRYPTION_KEY_VAR: &str = "ENCRYPTION_KEY";
pub const CONFIG_PATH_VAR: &str = "KEYSTASH_CONFIG";

/// Contents of keystash.yaml.
///
/// There is no encryption key field; `ENCRYPTION_KEY` is only read from
/// the environment.
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Path to the encrypted keys file
    #[serde(default)]
    pub keys_file: Option<String>,

    /// Suffix for environment variables reported by `list`
    #[serde(default)]
    pub env_suffix: Option<String>,

    /// User ids allowed to manage keys through the admin service
    #[serde(default)]
    pub admin_users: Option<Vec<String>>,
}

impl ConfigFile {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: ConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        Ok(config)
    }
}

/// Resolved store configuration.
#[derive(Clone)]
pub struct StoreConfig {
    pub keys_file: PathBuf,
    /// Base64 key material from `ENCRYPTION_KEY`
    pub encryption_key: Option<String>,
    pub env_suffix: String,
    pub admin_users: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            keys_file: PathBuf::from(DEFAULT_KEYS_FILE),
            encryption_key: None,
            env_suffix: DEFAULT_ENV_SUFFIX.to_string(),
            admin_users: vec!["admin".to_string()],
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("keys_file", &self.keys_file)
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "<redacted>"),
            )
            .field("env_suffix", &self.env_suffix)
            .field("admin_users", &self.admin_users)
            .finish()
    }
}

impl StoreConfig {
    /// Load from the real environment, picking up keystash.yaml if present.
    pub fn from_env() -> Result<Self> {
        Self::load(None, &SystemEnv)
    }

    /// Load configuration.
    ///
    /// An explicit `config_path` (or `KEYSTASH_CONFIG`) must exist. Without
    /// either, `keystash.yaml` in the working directory is used when present.
    pub fn load(config_path: Option<&Path>, env: &dyn ReadEnv) -> Result<Self> {
        let mut config = Self::default();

        let explicit = config_path
            .map(Path::to_path_buf)
            .or_else(|| env.var(CONFIG_PATH_VAR).ok().map(PathBuf::from));

        let file = match explicit {
            Some(path) => Some(ConfigFile::from_file(&path)?),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Some(ConfigFile::from_file(DEFAULT_CONFIG_FILE)?)
            }
            None => None,
        };

        if let Some(file) = file {
            config.apply_file(file)?;
        }

        if let Ok(keys_file) = env.var(KEYS_FILE_VAR) {
            config.keys_file = expand_home(&keys_file)?;
        }

        if let Ok(key) = env.var(ENCRYPTION_KEY_VAR) {
            if !key.trim().is_empty() {
                config.encryption_key = Some(key);
            }
        }

        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) -> Result<()> {
        if let Some(keys_file) = file.keys_file {
            self.keys_file = expand_home(&keys_file)?;
        }
        if let Some(suffix) = file.env_suffix {
            self.env_suffix = suffix;
        }
        if let Some(admins) = file.admin_users {
            self.admin_users = admins;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.keys_file.as_os_str().is_empty() {
            anyhow::bail!("Keys file path cannot be empty");
        }

        if self.env_suffix.is_empty() {
            anyhow::bail!("Environment suffix cannot be empty");
        }

        if self.admin_users.is_empty() {
            anyhow::bail!("At least one admin user must be configured");
        }

        if self.admin_users.iter().any(|user| user.trim().is_empty()) {
            anyhow::bail!("Admin user ids cannot be empty");
        }

        if let Some(key) = &self.encryption_key {
            KeyCipher::from_base64(key)
                .with_context(|| format!("{} is not usable", ENCRYPTION_KEY_VAR))?;
        }

        Ok(())
    }
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &str) -> Result<PathBuf> {
    if path == "~" {
        return dirs::home_dir().context("Failed to determine home directory");
    }

    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir().context("Failed to determine home directory")?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}
