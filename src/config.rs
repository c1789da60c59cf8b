//! Secret store configuration
//!
//! Paths and the optional injected master key, read from the process
//! environment. Empty variables count as unset.

use std::path::{Path, PathBuf};

use crate::db::DEFAULT_STORE_FILE;
use crate::secrets::master_key::{MasterKeyOptions, DEFAULT_KEY_FILE, MASTER_KEY_ENV};

/// Store file path variable
pub const STORE_PATH_ENV: &str = "SECURE_ENV_DB_PATH";

/// Key file path variable
pub const KEY_FILE_ENV: &str = "SECURE_ENV_KEY_FILE";

/// How many parent directories relative paths are searched in
pub const SEARCH_PARENT_HOPS: usize = 2;

#[derive(Clone)]
pub struct SecretsConfig {
    pub store_path: PathBuf,
    pub key_path: PathBuf,
    /// Encoded master key injected from outside; replaces the key file
    pub master_key_override: Option<String>,
}

impl std::fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("store_path", &self.store_path)
            .field("key_path", &self.key_path)
            .field(
                "master_key_override",
                &self.master_key_override.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_FILE),
            key_path: PathBuf::from(DEFAULT_KEY_FILE),
            master_key_override: None,
        }
    }
}

impl SecretsConfig {
    /// Defaults overlaid with `SECURE_ENV_*` variables, with relative paths
    /// that are missing in the working directory looked up in its parents
    pub fn from_env() -> Self {
        let config = Self::from_lookup(|name| std::env::var(name).ok());
        match std::env::current_dir() {
            Ok(cwd) => config.discover_from(&cwd),
            Err(_) => config,
        }
    }

    /// Resolve relative store/key paths that do not exist under `start`
    /// against up to `SEARCH_PARENT_HOPS` parent directories.
    /// Paths found nowhere are left unchanged so they get created in place.
    pub fn discover_from(mut self, start: &Path) -> Self {
        self.store_path = discover(start, self.store_path);
        self.key_path = discover(start, self.key_path);
        self
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            store_path: non_empty(STORE_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            key_path: non_empty(KEY_FILE_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.key_path),
            master_key_override: non_empty(MASTER_KEY_ENV),
        }
    }

    /// Store and key file under one directory, no override
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            store_path: dir.join(DEFAULT_STORE_FILE),
            key_path: dir.join(DEFAULT_KEY_FILE),
            master_key_override: None,
        }
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn with_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = path.into();
        self
    }

    pub fn with_master_key_override(mut self, encoded: Option<String>) -> Self {
        self.master_key_override = encoded;
        self
    }

    pub fn master_key_options(&self) -> MasterKeyOptions {
        MasterKeyOptions {
            key_path: self.key_path.clone(),
            override_value: self.master_key_override.clone(),
        }
    }
}

fn discover(start: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() || start.join(&path).exists() {
        return path;
    }
    find_upwards(start, &path, SEARCH_PARENT_HOPS).unwrap_or(path)
}

fn find_upwards(start: &Path, relative: &Path, max_hops: usize) -> Option<PathBuf> {
    start
        .ancestors()
        .skip(1)
        .take(max_hops)
        .map(|dir| dir.join(relative))
        .find(|candidate| candidate.exists())
}
