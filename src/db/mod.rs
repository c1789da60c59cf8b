//! Database Module
//!
//! SQLite-backed persistent store of encrypted secrets.
//! Values arrive here already encrypted; this layer never sees plaintext.

mod schema;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use rusqlite::backup::Backup;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};

use crate::error::{Result, SecretError};
use crate::models::{Category, SecretEntry, StoreCounts};
use crate::secrets::cipher::{generate_salt, SALT_LEN};

/// Default store file name
pub const DEFAULT_STORE_FILE: &str = "secure_env.db";

/// Persistent secret store
pub struct SecretStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SecretStore {
    /// Open (or create) the store file and apply the schema
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(schema::CREATE_SCHEMA)?;
        conn.execute(
            "INSERT OR IGNORE INTO store_meta (key, value) VALUES (?1, ?2)",
            params![schema::META_SCHEMA_VERSION, schema::SCHEMA_VERSION],
        )?;
        Ok(())
    }

    // A panic while holding the lock leaves the connection itself usable.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace by name.
    ///
    /// `created_at` survives replacement, `updated_at` always moves forward,
    /// and a `None` description keeps the stored one.
    pub fn upsert(
        &self,
        name: &str,
        ciphertext: &str,
        category: Category,
        description: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        self.conn().execute(
            "INSERT INTO secrets (name, ciphertext, category, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(name) DO UPDATE SET
                ciphertext = excluded.ciphertext,
                category = excluded.category,
                description = COALESCE(excluded.description, secrets.description),
                updated_at = MAX(excluded.updated_at, secrets.updated_at + 1)",
            params![name, ciphertext, category.as_str(), description, now],
        )?;
        Ok(())
    }

    /// Fetch one row
    pub fn fetch(&self, name: &str) -> Result<SecretEntry> {
        self.conn()
            .query_row(
                "SELECT name, ciphertext, category, description, created_at, updated_at
                 FROM secrets WHERE name = ?1",
                [name],
                row_to_entry,
            )
            .optional()?
            .ok_or_else(|| SecretError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        let found = self
            .conn()
            .query_row("SELECT 1 FROM secrets WHERE name = ?1", [name], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// `false` if the name was absent
    pub fn delete(&self, name: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM secrets WHERE name = ?1", [name])?;
        Ok(affected > 0)
    }

    /// All rows ordered by name, optionally limited to one category
    pub fn list_all(&self, category: Option<Category>) -> Result<Vec<SecretEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT name, ciphertext, category, description, created_at, updated_at
             FROM secrets
             WHERE ?1 IS NULL OR category = ?1
             ORDER BY name",
        )?;

        let iter = stmt.query_map([category.map(|c| c.as_str())], row_to_entry)?;
        let mut entries = Vec::new();
        for entry in iter {
            entries.push(entry?);
        }
        Ok(entries)
    }

    /// Totals per category
    pub fn count(&self) -> Result<StoreCounts> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT category, COUNT(*) FROM secrets GROUP BY category")?;
        let iter = stmt.query_map([], |row| {
            let category = parse_category(row, 0)?;
            let count: i64 = row.get(1)?;
            Ok((category, count as usize))
        })?;

        let mut counts = StoreCounts::default();
        for row in iter {
            let (category, count) = row?;
            counts.total += count;
            counts.by_category.insert(category, count);
        }
        Ok(counts)
    }

    /// Key-derivation salt of this store, created on first use
    pub fn load_or_create_salt(&self) -> Result<[u8; SALT_LEN]> {
        if let Some(salt) = self.read_salt()? {
            return Ok(salt);
        }

        let salt = generate_salt();
        self.conn().execute(
            "INSERT OR IGNORE INTO store_meta (key, value) VALUES (?1, ?2)",
            params![schema::META_KDF_SALT, BASE64.encode(salt)],
        )?;

        // re-read in case another connection won the insert
        self.read_salt()?.ok_or_else(|| {
            SecretError::KeyUnavailable("key-derivation salt could not be stored".to_string())
        })
    }

    fn read_salt(&self) -> Result<Option<[u8; SALT_LEN]>> {
        let encoded: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                [schema::META_KDF_SALT],
                |row| row.get(0),
            )
            .optional()?;

        encoded
            .map(|encoded| decode_salt(&encoded).map_err(SecretError::KeyUnavailable))
            .transpose()
    }

    /// Snapshot the whole store into `out_path` (overwrites it)
    pub fn backup_to(&self, out_path: &Path) -> Result<()> {
        if same_file(&self.path, out_path) {
            return Err(SecretError::Validation(
                "backup target is the active store file".to_string(),
            ));
        }
        if let Some(parent) = out_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = self.conn();
        let mut out_conn = Connection::open(out_path)?;
        let backup = Backup::new(&conn, &mut out_conn)?;
        backup.run_to_completion(5, Duration::from_millis(10), None)?;
        Ok(())
    }

    /// Overwrite the active store with the snapshot at `in_path`.
    ///
    /// Irreversible: every current row is replaced.
    pub fn restore_from(&self, in_path: &Path) -> Result<()> {
        if !in_path.is_file() {
            return Err(SecretError::Validation(format!(
                "backup file {} does not exist",
                in_path.display()
            )));
        }
        if same_file(&self.path, in_path) {
            return Err(SecretError::Validation(
                "restore source is the active store file".to_string(),
            ));
        }

        let in_conn = Connection::open_with_flags(in_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let has_table: bool = in_conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'secrets')",
                [],
                |row| row.get(0),
            )
            .map_err(|_| {
                SecretError::Validation(format!("{} is not a secret store", in_path.display()))
            })?;
        if !has_table {
            return Err(SecretError::Validation(format!(
                "{} is not a secret store",
                in_path.display()
            )));
        }

        // without a usable salt none of the snapshot's values could be decrypted
        let encoded: Option<String> = in_conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                [schema::META_KDF_SALT],
                |row| row.get(0),
            )
            .optional()
            .unwrap_or(None);
        let encoded = encoded.ok_or_else(|| {
            SecretError::Validation(format!(
                "{} has no key-derivation salt",
                in_path.display()
            ))
        })?;
        decode_salt(&encoded).map_err(|reason| {
            SecretError::Validation(format!("{}: {}", in_path.display(), reason))
        })?;

        {
            let mut conn = self.conn();
            let backup = Backup::new(&in_conn, &mut conn)?;
            backup.run_to_completion(5, Duration::from_millis(10), None)?;
        }

        self.initialize()
    }
}

fn decode_salt(encoded: &str) -> std::result::Result<[u8; SALT_LEN], String> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|_| "stored key-derivation salt is malformed".to_string())?;
    bytes
        .try_into()
        .map_err(|_| "stored key-derivation salt has the wrong length".to_string())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn parse_category(row: &Row<'_>, idx: usize) -> rusqlite::Result<Category> {
    let raw: String = row.get(idx)?;
    Category::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<SecretEntry> {
    Ok(SecretEntry {
        name: row.get(0)?,
        ciphertext: row.get(1)?,
        category: parse_category(row, 2)?,
        description: row.get(3)?,
        created_at: millis_to_datetime(row.get(4)?),
        updated_at: millis_to_datetime(row.get(5)?),
    })
}
