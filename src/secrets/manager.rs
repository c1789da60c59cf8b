//! Secret Manager - master key, encrypted store and decryption cache
//!
//! - the master key is resolved once when the manager is opened
//! - values are encrypted under a key derived from the master key and the store salt
//! - decrypted values are cached in memory until invalidated
//!
//! The manager is an explicit context object: open it once at startup and
//! share it by reference (`&SecretManager` or `Arc<SecretManager>`).

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use zeroize::Zeroizing;

use crate::config::SecretsConfig;
use crate::db::SecretStore;
use crate::error::{Result, SecretError};
use crate::migration::{is_valid_env_key, parse_env, render_template};
use crate::models::{
    BootstrapReport, Category, ImportReport, ImportWarning, ManagerStats, SecretInfo,
};
use crate::secrets::cache::SecretCache;
use crate::secrets::category::infer_category;
use crate::secrets::cipher::{self, CipherKey};
use crate::secrets::master_key::{KeySource, MasterKey, MasterKeyProvider};

/// Secret Manager
pub struct SecretManager {
    store: SecretStore,
    master_key: MasterKey,
    key_source: KeySource,
    /// Re-derived when a restore brings in a different salt
    cipher_key: RwLock<CipherKey>,
    cache: SecretCache,
    /// Serializes writes and cache fills
    writes: Mutex<()>,
}

impl SecretManager {
    /// Resolve the master key and open the store described by `config`
    pub fn open(config: &SecretsConfig) -> Result<Self> {
        let provider = MasterKeyProvider::new(config.master_key_options());
        let (master_key, key_source) = provider.resolve()?;
        Self::with_master_key(&config.store_path, master_key, key_source)
    }

    /// Open a store with an already resolved master key
    pub fn with_master_key(
        store_path: &Path,
        master_key: MasterKey,
        key_source: KeySource,
    ) -> Result<Self> {
        let store = SecretStore::open(store_path)?;
        let salt = store.load_or_create_salt()?;
        let cipher_key = CipherKey::derive(&master_key, &salt);

        tracing::info!(
            store = %store_path.display(),
            key_source = %key_source,
            "Secret manager ready"
        );

        Ok(Self {
            store,
            master_key,
            key_source,
            cipher_key: RwLock::new(cipher_key),
            cache: SecretCache::new(),
            writes: Mutex::new(()),
        })
    }

    pub fn key_source(&self) -> KeySource {
        self.key_source
    }

    pub fn store_path(&self) -> &Path {
        self.store.path()
    }

    fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cipher_key(&self) -> RwLockReadGuard<'_, CipherKey> {
        self.cipher_key.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a value, inferring the category from the name unless given
    pub fn set(
        &self,
        name: &str,
        value: &str,
        category: Option<Category>,
        description: Option<&str>,
    ) -> Result<()> {
        let name = validate_name(name)?;
        let category = category.unwrap_or_else(|| infer_category(name));

        let _guard = self.write_lock();
        let token = cipher::encrypt(&self.cipher_key(), value)?;
        self.store.upsert(name, &token, category, description)?;
        self.cache.put(name, value.to_string());

        tracing::info!(name, category = %category, "Secret set");
        Ok(())
    }

    /// Decrypted value; `NotFound` if absent
    pub fn get(&self, name: &str) -> Result<String> {
        let name = validate_name(name)?;
        if let Some(value) = self.cache.get(name) {
            tracing::debug!(name, "Cache hit");
            return Ok(value);
        }

        let _guard = self.write_lock();
        // filled by another reader while we waited
        if let Some(value) = self.cache.get(name) {
            return Ok(value);
        }

        tracing::debug!(name, "Cache miss");
        let entry = self.store.fetch(name)?;
        let value = cipher::decrypt(&self.cipher_key(), &entry.ciphertext).map_err(|e| {
            tracing::error!(name, "Failed to decrypt secret: {}", e);
            e
        })?;
        self.cache.put(name, value.clone());
        Ok(value)
    }

    /// Decrypted value, or `default` when the name is absent.
    ///
    /// Integrity failures are still returned as errors.
    pub fn get_or(&self, name: &str, default: &str) -> Result<String> {
        match self.get(name) {
            Err(SecretError::NotFound(_)) => Ok(default.to_string()),
            other => other,
        }
    }

    /// Remove from store and cache; `false` if absent
    pub fn delete(&self, name: &str) -> Result<bool> {
        let name = validate_name(name)?;

        let _guard = self.write_lock();
        let removed = self.store.delete(name)?;
        self.cache.invalidate(name);

        if removed {
            tracing::info!(name, "Secret deleted");
        }
        Ok(removed)
    }

    /// Presence check without decrypting
    pub fn contains(&self, name: &str) -> Result<bool> {
        let name = validate_name(name)?;
        self.store.contains(name)
    }

    /// Metadata ordered by name; values are never included
    pub fn list(&self, category: Option<Category>) -> Result<Vec<SecretInfo>> {
        Ok(self
            .store
            .list_all(category)?
            .into_iter()
            .map(SecretInfo::from)
            .collect())
    }

    /// Every value (optionally of one category), decrypted.
    ///
    /// The first entry that fails to decrypt aborts the call.
    pub fn reveal_all(&self, category: Option<Category>) -> Result<BTreeMap<String, String>> {
        let mut values = BTreeMap::new();
        for info in self.list(category)? {
            match self.get(&info.name) {
                Ok(value) => {
                    values.insert(info.name, value);
                }
                // deleted since listing
                Err(SecretError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(values)
    }

    pub fn stats(&self) -> Result<ManagerStats> {
        let counts = self.store.count()?;
        Ok(ManagerStats {
            total: counts.total,
            by_category: counts.by_category,
            cached_count: self.cache.len(),
            store_path: self.store.path().to_path_buf(),
        })
    }

    /// Import `KEY=VALUE` content.
    ///
    /// Malformed lines and rejected names become warnings; store failures abort.
    pub fn import_from(&self, source: &str, content: &str) -> Result<ImportReport> {
        let parsed = parse_env(content);
        let description = format!("imported from {}", source);
        let mut report = ImportReport {
            imported: 0,
            warnings: parsed.warnings,
        };

        for entry in &parsed.entries {
            match self.set(&entry.key, &entry.value, None, Some(&description)) {
                Ok(()) => report.imported += 1,
                Err(e) if e.is_fatal() => {
                    self.cache.invalidate_all();
                    return Err(e);
                }
                Err(e) => report.warnings.push(ImportWarning {
                    line: entry.line,
                    message: e.to_string(),
                }),
            }
        }

        report.warnings.sort_by_key(|w| w.line);
        for warning in &report.warnings {
            tracing::warn!(source, "Skipped import {}", warning);
        }

        self.cache.invalidate_all();
        tracing::info!(
            source,
            imported = report.imported,
            skipped = report.warnings.len(),
            "Import finished"
        );
        Ok(report)
    }

    /// Import a `.env` file
    pub fn import_file(&self, path: &Path) -> Result<ImportReport> {
        if !path.is_file() {
            return Err(SecretError::Validation(format!(
                "import file {} does not exist",
                path.display()
            )));
        }
        let content = Zeroizing::new(fs::read_to_string(path)?);
        self.import_from(&path.display().to_string(), &content)
    }

    /// Write a value-free template of every known name; returns the name count
    pub fn export_template(&self, target: &Path) -> Result<usize> {
        let infos = self.list(None)?;
        let text = render_template(&infos);

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Atomic write: temp file then rename
        let tmp_path = tmp_sibling(target);
        let written = fs::File::create(&tmp_path)
            .and_then(|mut file| {
                file.write_all(text.as_bytes())?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&tmp_path, target));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        tracing::info!(target = %target.display(), names = infos.len(), "Template exported");
        Ok(infos.len())
    }

    /// Export decrypted values (optionally of one category) into this
    /// process's environment; returns how many were set.
    ///
    /// Environment writes are process-wide: call this during startup, before
    /// other threads read the environment.
    pub fn load_into_env(&self, category: Option<Category>) -> Result<usize> {
        let values = self.reveal_all(category)?;
        for (name, value) in &values {
            std::env::set_var(name, value);
        }
        tracing::info!(count = values.len(), "Loaded secrets into the environment");
        Ok(values.len())
    }

    /// Startup helper: seed an empty store from `env_file` (when it exists),
    /// then optionally load every value into the environment.
    ///
    /// A store that already holds secrets is never re-imported.
    pub fn bootstrap(&self, env_file: &Path, auto_load: bool) -> Result<BootstrapReport> {
        let mut report = BootstrapReport::default();

        if self.store.count()?.total == 0 && env_file.is_file() {
            tracing::info!(env_file = %env_file.display(), "Empty store, importing");
            report.imported = Some(self.import_file(env_file)?);
        }
        if auto_load {
            report.loaded = self.load_into_env(None)?;
        }
        Ok(report)
    }

    /// Snapshot the store file
    pub fn backup(&self, path: &Path) -> Result<()> {
        let _guard = self.write_lock();
        self.store.backup_to(path)?;
        tracing::info!(path = %path.display(), "Store backed up");
        Ok(())
    }

    /// Replace the active store with a backup. Irreversible; callers confirm first.
    pub fn restore(&self, path: &Path) -> Result<()> {
        let _guard = self.write_lock();
        let restored = self.store.restore_from(path).and_then(|()| {
            let salt = self.store.load_or_create_salt()?;
            let cipher_key = CipherKey::derive(&self.master_key, &salt);
            *self.cipher_key.write().unwrap_or_else(PoisonError::into_inner) = cipher_key;
            Ok(())
        });
        // the store may have changed even on failure
        self.cache.invalidate_all();
        restored?;

        tracing::warn!(path = %path.display(), "Store restored from backup");
        Ok(())
    }
}

/// Trimmed name, or `Validation` if it is not usable as a key
fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SecretError::Validation("secret name must not be empty".to_string()));
    }
    if !is_valid_env_key(trimmed) {
        return Err(SecretError::Validation(format!(
            "invalid secret name {:?}: use letters, digits, '_', '.' or '-'",
            trimmed
        )));
    }
    Ok(trimmed)
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::{tempdir, TempDir};

    fn open_temp() -> (TempDir, SecretManager) {
        let dir = tempdir().unwrap();
        let manager = SecretManager::open(&SecretsConfig::in_dir(dir.path())).unwrap();
        (dir, manager)
    }

    #[test]
    fn test_set_then_get() {
        let (_dir, manager) = open_temp();
        assert_eq!(manager.key_source(), KeySource::Generated);

        manager
            .set("DATABASE_PASSWORD", "super_secret_password", None, Some("db password"))
            .unwrap();
        assert_eq!(manager.get("DATABASE_PASSWORD").unwrap(), "super_secret_password");

        // read-through after the cache is dropped
        manager.cache.invalidate_all();
        assert_eq!(manager.get("DATABASE_PASSWORD").unwrap(), "super_secret_password");
        assert_eq!(manager.stats().unwrap().cached_count, 1);
    }

    #[test]
    fn test_values_are_not_stored_in_plaintext() {
        let (_dir, manager) = open_temp();
        manager.set("OPENAI_API_KEY", "sk-1234567890", None, None).unwrap();

        let entry = manager.store.fetch("OPENAI_API_KEY").unwrap();
        assert!(!entry.ciphertext.contains("sk-1234567890"));
        let raw = fs::read(manager.store_path()).unwrap();
        assert!(!raw.windows(13).any(|w| w == b"sk-1234567890"));
    }

    #[test]
    fn test_second_set_replaces() {
        let (_dir, manager) = open_temp();
        manager.set("JWT_SECRET_KEY", "v1", None, None).unwrap();
        manager.set("JWT_SECRET_KEY", "v2", None, None).unwrap();

        assert_eq!(manager.get("JWT_SECRET_KEY").unwrap(), "v2");
        let listed = manager.list(None).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "JWT_SECRET_KEY");
    }

    #[test]
    fn test_set_overrides_stale_cache() {
        let (_dir, manager) = open_temp();
        manager.set("API_TOKEN", "fresh-1", None, None).unwrap();
        manager.cache.put("API_TOKEN", "stale".to_string());

        manager.set("API_TOKEN", "fresh-2", None, None).unwrap();
        assert_eq!(manager.get("API_TOKEN").unwrap(), "fresh-2");
    }

    #[test]
    fn test_delete_clears_cache() {
        let (_dir, manager) = open_temp();
        manager.set("SMTP_PASSWORD", "pw", None, None).unwrap();
        assert_eq!(manager.get("SMTP_PASSWORD").unwrap(), "pw");

        assert!(manager.delete("SMTP_PASSWORD").unwrap());
        assert!(!manager.delete("SMTP_PASSWORD").unwrap());
        assert!(matches!(
            manager.get("SMTP_PASSWORD"),
            Err(SecretError::NotFound(_))
        ));
        assert_eq!(manager.get_or("SMTP_PASSWORD", "fallback").unwrap(), "fallback");
        assert!(!manager.contains("SMTP_PASSWORD").unwrap());
    }

    #[test]
    fn test_category_inference_and_override() {
        let (_dir, manager) = open_temp();
        manager.set("DATABASE_PASSWORD", "x", None, None).unwrap();
        manager.set("JWT_SECRET_KEY", "y", None, None).unwrap();
        manager.set("REDIS_PASSWORD", "z", Some(Category::Cache), None).unwrap();

        let categories: BTreeMap<_, _> = manager
            .list(None)
            .unwrap()
            .into_iter()
            .map(|i| (i.name, i.category))
            .collect();
        assert_eq!(categories["DATABASE_PASSWORD"], Category::Database);
        assert_eq!(categories["JWT_SECRET_KEY"], Category::Security);
        assert_eq!(categories["REDIS_PASSWORD"], Category::Cache);

        let cache_only = manager.list(Some(Category::Cache)).unwrap();
        assert_eq!(cache_only.len(), 1);
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let (_dir, manager) = open_temp();
        for name in ["", "   ", "HAS SPACE", "A=B"] {
            assert!(
                matches!(manager.set(name, "v", None, None), Err(SecretError::Validation(_))),
                "{:?} was accepted",
                name
            );
        }
        assert_eq!(manager.stats().unwrap().total, 0);

        // surrounding whitespace is trimmed
        manager.set("  PADDED  ", "v", None, None).unwrap();
        assert_eq!(manager.get("PADDED").unwrap(), "v");
    }

    #[test]
    fn test_import_scenario() {
        let (_dir, manager) = open_temp();
        let report = manager.import_from(".env", "A=1\n#comment\nB=2").unwrap();
        assert_eq!(report.imported, 2);
        assert!(report.warnings.is_empty());

        assert_eq!(manager.stats().unwrap().total, 2);
        let listed = manager.list(None).unwrap();
        let names: Vec<_> = listed.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert!(listed.iter().all(|i| i.category == Category::General));
        assert_eq!(listed[0].description.as_deref(), Some("imported from .env"));
        assert_eq!(manager.get("B").unwrap(), "2");
    }

    #[test]
    fn test_import_is_idempotent() {
        let (dir, manager) = open_temp();
        let env_path = dir.path().join(".env");
        fs::write(
            &env_path,
            "DATABASE_HOST=localhost\nJWT_SECRET_KEY=\"abc\"\nREDIS_URL='redis://r:6379/0'\n",
        )
        .unwrap();

        manager.import_file(&env_path).unwrap();
        let once_meta: Vec<_> = manager
            .list(None)
            .unwrap()
            .into_iter()
            .map(|i| (i.name, i.category, i.description))
            .collect();
        let once_values = manager.reveal_all(None).unwrap();

        manager.import_file(&env_path).unwrap();
        let twice_meta: Vec<_> = manager
            .list(None)
            .unwrap()
            .into_iter()
            .map(|i| (i.name, i.category, i.description))
            .collect();
        let twice_values = manager.reveal_all(None).unwrap();

        assert_eq!(once_meta, twice_meta);
        assert_eq!(once_values, twice_values);
        assert_eq!(twice_values["REDIS_URL"], "redis://r:6379/0");
    }

    #[test]
    fn test_import_skips_bad_lines() {
        let (_dir, manager) = open_temp();
        let report = manager
            .import_from("inline", "GOOD=1\nnot an assignment\nBAD KEY=2\nALSO_GOOD=3")
            .unwrap();
        assert_eq!(report.imported, 2);
        let lines: Vec<_> = report.warnings.iter().map(|w| w.line).collect();
        assert_eq!(lines, vec![2, 3]);
        assert_eq!(manager.stats().unwrap().total, 2);
    }

    #[test]
    fn test_import_missing_file() {
        let (dir, manager) = open_temp();
        assert!(matches!(
            manager.import_file(&dir.path().join("nope.env")),
            Err(SecretError::Validation(_))
        ));
    }

    #[test]
    fn test_export_template() {
        let (dir, manager) = open_temp();
        manager
            .set("DATABASE_PASSWORD", "hunter2", None, Some("db password"))
            .unwrap();
        manager.set("LOG_LEVEL", "INFO", None, None).unwrap();

        let target = dir.path().join("out").join(".env.template");
        assert_eq!(manager.export_template(&target).unwrap(), 2);

        let text = fs::read_to_string(&target).unwrap();
        assert!(text.contains("DATABASE_PASSWORD=<set actual value>"));
        assert!(text.contains("LOG_LEVEL=<set actual value>"));
        assert!(text.contains("# db password"));
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("INFO\n"));
        assert!(!tmp_sibling(&target).exists());
    }

    #[test]
    fn test_backup_restore_scenario() {
        let (dir, manager) = open_temp();
        manager
            .set("REDIS_PASSWORD", "secret1", Some(Category::Cache), None)
            .unwrap();

        let backup_path = dir.path().join("secure_env.db.backup");
        manager.backup(&backup_path).unwrap();
        manager.delete("REDIS_PASSWORD").unwrap();
        assert!(manager.get("REDIS_PASSWORD").is_err());

        manager.restore(&backup_path).unwrap();
        assert_eq!(manager.get("REDIS_PASSWORD").unwrap(), "secret1");
        assert_eq!(manager.list(None).unwrap()[0].category, Category::Cache);
    }

    #[test]
    fn test_failed_restore_keeps_store_and_drops_cache() {
        let (dir, manager) = open_temp();
        manager.set("A", "kept", None, None).unwrap();
        let backup_path = dir.path().join("broken.backup");
        manager.backup(&backup_path).unwrap();
        rusqlite::Connection::open(&backup_path)
            .unwrap()
            .execute("UPDATE store_meta SET value = '!!' WHERE key = 'kdf_salt'", [])
            .unwrap();

        manager.set("LATER", "only-in-live-store", None, None).unwrap();
        assert!(matches!(
            manager.restore(&backup_path),
            Err(SecretError::Validation(_))
        ));
        assert_eq!(manager.stats().unwrap().cached_count, 0);
        assert!(manager.contains("LATER").unwrap());
        assert_eq!(manager.get("LATER").unwrap(), "only-in-live-store");

        // the store still opens with its own salt
        let config = SecretsConfig::in_dir(dir.path());
        drop(manager);
        let reopened = SecretManager::open(&config).unwrap();
        assert_eq!(reopened.get("A").unwrap(), "kept");
    }

    #[test]
    fn test_export_failure_leaves_no_temp_file() {
        let (dir, manager) = open_temp();
        manager.set("LOG_LEVEL", "INFO", None, None).unwrap();

        // rename onto a non-empty directory fails
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "x").unwrap();

        assert!(manager.export_template(&target).is_err());
        assert!(!tmp_sibling(&target).exists());
        assert!(target.join("keep").exists());
    }

    #[test]
    fn test_load_into_env_by_category() {
        let (_dir, manager) = open_temp();
        manager
            .set("LOADENV_TEST_REDIS_HOST", "cache.internal", Some(Category::Cache), None)
            .unwrap();
        manager
            .set("LOADENV_TEST_OTHER", "ignored", Some(Category::General), None)
            .unwrap();

        assert_eq!(manager.load_into_env(Some(Category::Cache)).unwrap(), 1);
        assert_eq!(
            std::env::var("LOADENV_TEST_REDIS_HOST").unwrap(),
            "cache.internal"
        );
        assert!(std::env::var("LOADENV_TEST_OTHER").is_err());
    }

    #[test]
    fn test_bootstrap_imports_only_into_empty_store() {
        let (dir, manager) = open_temp();
        let env_path = dir.path().join(".env");
        fs::write(&env_path, "BOOTSTRAP_TEST_A=1\nBOOTSTRAP_TEST_B=2\n").unwrap();

        let first = manager.bootstrap(&env_path, true).unwrap();
        assert_eq!(first.imported.map(|r| r.imported), Some(2));
        assert_eq!(first.loaded, 2);
        assert_eq!(std::env::var("BOOTSTRAP_TEST_B").unwrap(), "2");

        // a populated store is left alone
        fs::write(&env_path, "BOOTSTRAP_TEST_A=changed\nBOOTSTRAP_TEST_C=3\n").unwrap();
        let second = manager.bootstrap(&env_path, false).unwrap();
        assert!(second.imported.is_none());
        assert_eq!(second.loaded, 0);
        assert_eq!(manager.get("BOOTSTRAP_TEST_A").unwrap(), "1");
        assert!(!manager.contains("BOOTSTRAP_TEST_C").unwrap());
    }

    #[test]
    fn test_bootstrap_without_env_file() {
        let (dir, manager) = open_temp();
        let report = manager.bootstrap(&dir.path().join(".env"), false).unwrap();
        assert!(report.imported.is_none());
        assert_eq!(manager.stats().unwrap().total, 0);
    }

    #[test]
    fn test_restore_from_other_store_rederives_key() {
        let dir = tempdir().unwrap();
        let master = MasterKey::generate();

        let source = SecretManager::with_master_key(
            &dir.path().join("a.db"),
            master.clone(),
            KeySource::Override,
        )
        .unwrap();
        source.set("JWT_SECRET_KEY", "from-a", None, None).unwrap();
        let backup_path = dir.path().join("a.backup");
        source.backup(&backup_path).unwrap();

        // different store, different salt, same master key
        let target =
            SecretManager::with_master_key(&dir.path().join("b.db"), master, KeySource::Override)
                .unwrap();
        target.set("LOCAL_ONLY", "b", None, None).unwrap();
        target.restore(&backup_path).unwrap();

        assert_eq!(target.get("JWT_SECRET_KEY").unwrap(), "from-a");
        assert!(matches!(target.get("LOCAL_ONLY"), Err(SecretError::NotFound(_))));
        assert_eq!(target.stats().unwrap().cached_count, 1);
    }

    #[test]
    fn test_lost_master_key_orphans_entries() {
        let dir = tempdir().unwrap();
        let config = SecretsConfig::in_dir(dir.path());
        {
            let manager = SecretManager::open(&config).unwrap();
            manager.set("DATABASE_PASSWORD", "x", None, None).unwrap();
            manager.set("JWT_SECRET_KEY", "y", None, None).unwrap();
        }

        fs::remove_file(&config.key_path).unwrap();
        let manager = SecretManager::open(&config).unwrap();
        assert_eq!(manager.key_source(), KeySource::Generated);

        for name in ["DATABASE_PASSWORD", "JWT_SECRET_KEY"] {
            assert!(matches!(
                manager.get(name),
                Err(SecretError::DecryptionFailed(_))
            ));
            // a default never masks an integrity failure
            assert!(manager.get_or(name, "d").is_err());
        }
        assert!(manager.reveal_all(None).is_err());

        // non-decrypting operations keep working
        assert_eq!(manager.list(None).unwrap().len(), 2);
        assert_eq!(manager.stats().unwrap().total, 2);
        assert_eq!(manager.stats().unwrap().cached_count, 0);
    }

    #[test]
    fn test_override_key_reads_existing_store() {
        let dir = tempdir().unwrap();
        let injected = MasterKey::generate();
        let config = SecretsConfig::in_dir(dir.path()).with_master_key_override(Some(injected.encode()));

        {
            let manager = SecretManager::open(&config).unwrap();
            assert_eq!(manager.key_source(), KeySource::Override);
            manager.set("OPENAI_API_KEY", "sk-1", None, None).unwrap();
        }
        assert!(!config.key_path.exists());

        let manager = SecretManager::open(&config).unwrap();
        assert_eq!(manager.get("OPENAI_API_KEY").unwrap(), "sk-1");
    }

    #[test]
    fn test_concurrent_set_and_get_same_name() {
        let (_dir, manager) = open_temp();
        let manager = Arc::new(manager);
        manager.set("SESSION_TOKEN", "v0", None, None).unwrap();

        let writer = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for i in 1..=50 {
                    manager
                        .set("SESSION_TOKEN", &format!("v{}", i), None, None)
                        .unwrap();
                    if i % 10 == 0 {
                        manager.cache.invalidate("SESSION_TOKEN");
                    }
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let value = manager.get("SESSION_TOKEN").unwrap();
                        let n: u32 = value.trim_start_matches('v').parse().unwrap();
                        assert!(n <= 50);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(manager.get("SESSION_TOKEN").unwrap(), "v50");
        manager.cache.invalidate_all();
        assert_eq!(manager.get("SESSION_TOKEN").unwrap(), "v50");
    }
}
