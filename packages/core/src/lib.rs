//! Keystash - encrypted API-key store for the model control panel gateway.
//!
//! Credentials resolve from an in-memory cache, the process environment and
//! an encrypted-at-rest JSON file, in that order. Values are encrypted with
//! a symmetric key from `ENCRYPTION_KEY` before they are written to disk.

pub mod admin;
pub mod cipher;
pub mod config;
pub mod document;
pub mod env;
pub mod error;
pub mod logging;
pub mod resolver;
pub mod store;
