//! Database Schema
//!
//! SQLite table definitions for the secret store

/// Schema creation SQL
pub const CREATE_SCHEMA: &str = r#"
-- Encrypted secrets
CREATE TABLE IF NOT EXISTS secrets (
    name TEXT PRIMARY KEY,
    ciphertext TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT 'general'
        CHECK (category IN ('database', 'security', 'api', 'email', 'cache', 'general')),
    description TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_secrets_category ON secrets(category);

-- Store metadata (key derivation salt, format version)
CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// `store_meta` key of the base64 key-derivation salt
pub const META_KDF_SALT: &str = "kdf_salt";

/// `store_meta` key of the schema version
pub const META_SCHEMA_VERSION: &str = "schema_version";

pub const SCHEMA_VERSION: &str = "1";
