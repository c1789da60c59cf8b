//! secure-env - encrypted local secret store
//!
//! Replaces plaintext `.env` files with a categorized SQLite store whose values
//! are encrypted under a single master key, plus the tooling to import,
//! export, back up and restore it.

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod migration;
pub mod models;
pub mod secrets;
pub mod settings;
pub mod utils;

pub use config::SecretsConfig;
pub use error::{CommandError, Result, SecretError};
pub use models::{Category, ImportReport, ManagerStats, SecretInfo};
pub use secrets::{KeySource, SecretManager};
pub use settings::AppSettings;
