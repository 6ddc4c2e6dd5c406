//! Process environment access.
//!
//! The store never calls `std::env` directly. It reads through [`ReadEnv`]
//! so lookups and listings can run against an in-memory [`MapEnv`] in tests
//! without touching the real process environment.

use std::collections::HashMap;
use std::env;

/// # Thread Safety
///
/// Does **not** require `Send + Sync`. The store adds the bounds itself:
///
/// ```ignore
/// let env: Arc<dyn ReadEnv + Send + Sync> = Arc::new(SystemEnv);
/// ```
pub trait ReadEnv {
    fn var(&self, key: &str) -> Result<String, env::VarError>;

    /// Names of every variable whose name is valid Unicode.
    fn var_names(&self) -> Vec<String>;
}

/// Zero-sized type — delegates to `std::env`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    #[inline]
    fn var(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }

    fn var_names(&self) -> Vec<String> {
        env::vars_os()
            .filter_map(|(name, _)| name.into_string().ok())
            .collect()
    }
}

/// Fixed set of variables held in memory.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}

impl ReadEnv for MapEnv {
    fn var(&self, key: &str) -> Result<String, env::VarError> {
        self.vars.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    fn var_names(&self) -> Vec<String> {
        self.vars.keys().cloned().collect()
    }
}
