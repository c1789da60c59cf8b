//! Secure Env Data Models
//!
//! Rows, listings and reports shared by the store, the manager and the CLI.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SecretError;

/// Secret category (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Database,
    Security,
    Api,
    Email,
    Cache,
    General,
}

impl Category {
    /// Every category, in section order.
    pub const ALL: [Category; 6] = [
        Category::Database,
        Category::Security,
        Category::Api,
        Category::Email,
        Category::Cache,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Database => "database",
            Category::Security => "security",
            Category::Api => "api",
            Category::Email => "email",
            Category::Cache => "cache",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| SecretError::Validation(format!("unknown category: {}", s)))
    }
}

/// Stored row: ciphertext is an opaque token
#[derive(Debug, Clone, PartialEq)]
pub struct SecretEntry {
    pub name: String,
    pub ciphertext: String,
    pub category: Category,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing projection (never carries a value)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretInfo {
    pub name: String,
    pub category: Category,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SecretEntry> for SecretInfo {
    fn from(entry: SecretEntry) -> Self {
        Self {
            name: entry.name,
            category: entry.category,
            description: entry.description,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

/// Row counts as reported by the store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCounts {
    pub total: usize,
    pub by_category: BTreeMap<Category, usize>,
}

/// Manager statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerStats {
    pub total: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub cached_count: usize,
    pub store_path: PathBuf,
}

/// A skipped import line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportWarning {
    /// 1-based line number in the source
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Import result
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub warnings: Vec<ImportWarning>,
}

/// What `SecretManager::bootstrap` did
#[derive(Debug, Clone, Default, Serialize)]
pub struct BootstrapReport {
    /// `None` when the store already had entries or no file was found
    pub imported: Option<ImportReport>,
    /// Values exported into the process environment
    pub loaded: usize,
}
