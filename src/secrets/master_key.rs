//! Master key provider
//!
//! Resolution order:
//! 1. override value (`SECURE_ENV_MASTER_KEY`), for key injection in production
//! 2. key file (`.master_key` by default)
//! 3. generate a new key and create the key file (owner read/write only)
//!
//! Both sources hold the 32 raw key bytes as URL-safe base64.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use rand::RngCore;
use serde::Serialize;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Result, SecretError};

/// Master key length (256-bit)
pub const MASTER_KEY_LEN: usize = 32;

/// Default key file name
pub const DEFAULT_KEY_FILE: &str = ".master_key";

/// Environment variable holding an override key
pub const MASTER_KEY_ENV: &str = "SECURE_ENV_MASTER_KEY";

/// URL-safe base64; decoding accepts padded and unpadded input
const KEY_ENCODING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Zeroize-on-drop master key wrapper
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; MASTER_KEY_LEN],
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

impl MasterKey {
    /// New key from the OS CSPRNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; MASTER_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; MASTER_KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Decode the transport encoding.
    pub fn decode(encoded: &str) -> Result<Self> {
        let decoded = Zeroizing::new(
            KEY_ENCODING
                .decode(encoded.trim())
                .map_err(|_| SecretError::KeyUnavailable("master key is not valid base64".to_string()))?,
        );

        if decoded.len() != MASTER_KEY_LEN {
            return Err(SecretError::KeyUnavailable(format!(
                "master key must be {} bytes, got {}",
                MASTER_KEY_LEN,
                decoded.len()
            )));
        }

        let mut bytes = [0u8; MASTER_KEY_LEN];
        bytes.copy_from_slice(&decoded);
        Ok(Self { bytes })
    }

    /// Transport encoding of the key
    pub fn encode(&self) -> String {
        KEY_ENCODING.encode(self.bytes)
    }

    pub(crate) fn expose(&self) -> &[u8; MASTER_KEY_LEN] {
        &self.bytes
    }
}

/// Where the active master key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    Override,
    KeyFile,
    Generated,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            KeySource::Override => "override",
            KeySource::KeyFile => "key file",
            KeySource::Generated => "generated",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct MasterKeyOptions {
    pub key_path: PathBuf,
    /// Encoded key that takes precedence over the key file
    pub override_value: Option<String>,
}

/// Master key provider
pub struct MasterKeyProvider {
    options: MasterKeyOptions,
}

impl MasterKeyProvider {
    pub fn new(options: MasterKeyOptions) -> Self {
        Self { options }
    }

    pub fn key_path(&self) -> &Path {
        &self.options.key_path
    }

    /// Resolve the active master key, generating one if nothing exists yet.
    pub fn resolve(&self) -> Result<(MasterKey, KeySource)> {
        if let Some(value) = &self.options.override_value {
            let key = MasterKey::decode(value)?;
            tracing::info!("Master key loaded from override source");
            return Ok((key, KeySource::Override));
        }

        let path = &self.options.key_path;
        if let Some(key) = read_key_file(path)? {
            tracing::info!(path = %path.display(), "Master key loaded from key file");
            return Ok((key, KeySource::KeyFile));
        }

        let key = MasterKey::generate();
        match create_key_file(path, &key) {
            Ok(()) => {
                tracing::warn!(
                    path = %path.display(),
                    "Generated a new master key; losing this file makes every stored secret unreadable"
                );
                Ok((key, KeySource::Generated))
            }
            // another process created it first
            Err(SecretError::Io(e)) if e.kind() == ErrorKind::AlreadyExists => {
                let key = read_key_file(path)?.ok_or_else(|| {
                    SecretError::KeyUnavailable(format!("key file {} vanished", path.display()))
                })?;
                Ok((key, KeySource::KeyFile))
            }
            Err(SecretError::Io(e)) => Err(SecretError::KeyUnavailable(format!(
                "cannot create key file {}: {}",
                path.display(),
                e
            ))),
            Err(e) => Err(e),
        }
    }
}

/// `Ok(None)` when the file does not exist.
fn read_key_file(path: &Path) -> Result<Option<MasterKey>> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let contents = Zeroizing::new(contents);
            MasterKey::decode(&contents).map(Some).map_err(|e| {
                SecretError::KeyUnavailable(format!("key file {} is malformed: {}", path.display(), e))
            })
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SecretError::KeyUnavailable(format!(
            "cannot read key file {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Create the key file with owner-only permissions from the first syscall.
fn create_key_file(path: &Path, key: &MasterKey) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
            let _ = fs::remove_file(path);
            return Err(SecretError::Permission(format!(
                "cannot restrict permissions on {}: {}",
                path.display(),
                e
            )));
        }
    }

    let encoded = Zeroizing::new(key.encode());
    let written = file
        .write_all(encoded.as_bytes())
        .and_then(|_| file.write_all(b"\n"))
        .and_then(|_| file.sync_all());
    if let Err(e) = written {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(e.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn provider(key_path: PathBuf, override_value: Option<String>) -> MasterKeyProvider {
        MasterKeyProvider::new(MasterKeyOptions {
            key_path,
            override_value,
        })
    }

    #[test]
    fn test_generates_then_reloads() {
        let dir = tempdir().unwrap();
        let key_path = dir.path().join("keys").join(".master_key");

        let (first, source) = provider(key_path.clone(), None).resolve().unwrap();
        assert_eq!(source, KeySource::Generated);
        assert!(key_path.exists());

        let (second, source) = provider(key_path, None).resolve().unwrap();
        assert_eq!(source, KeySource::KeyFile);
        assert_eq!(first.expose(), second.expose());
    }

    #[cfg(unix)]
    #[test]
    fn test_generated_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let key_path = dir.path().join(".master_key");
        provider(key_path.clone(), None).resolve().unwrap();

        let mode = fs::metadata(&key_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_override_wins_over_key_file() {
        let dir = tempdir().unwrap();
        let key_path = dir.path().join(".master_key");
        let (file_key, _) = provider(key_path.clone(), None).resolve().unwrap();

        let injected = MasterKey::generate();
        let (key, source) = provider(key_path, Some(injected.encode())).resolve().unwrap();
        assert_eq!(source, KeySource::Override);
        assert_eq!(key.expose(), injected.expose());
        assert_ne!(key.expose(), file_key.expose());
    }

    #[test]
    fn test_override_does_not_create_key_file() {
        let dir = tempdir().unwrap();
        let key_path = dir.path().join(".master_key");
        let injected = MasterKey::generate();
        provider(key_path.clone(), Some(injected.encode())).resolve().unwrap();
        assert!(!key_path.exists());
    }

    #[test]
    fn test_decode_accepts_unpadded_and_whitespace() {
        let key = MasterKey::generate();
        let unpadded = key.encode().trim_end_matches('=').to_string();
        let decoded = MasterKey::decode(&format!("  {}\n", unpadded)).unwrap();
        assert_eq!(decoded.expose(), key.expose());
    }

    #[test]
    fn test_malformed_key_file_is_unavailable() {
        let dir = tempdir().unwrap();
        let key_path = dir.path().join(".master_key");
        fs::write(&key_path, "definitely not a key").unwrap();

        let result = provider(key_path.clone(), None).resolve();
        assert!(matches!(result, Err(SecretError::KeyUnavailable(_))));
        // the broken file is left alone
        assert_eq!(fs::read_to_string(&key_path).unwrap(), "definitely not a key");
    }

    #[test]
    fn test_wrong_length_override_is_unavailable() {
        let dir = tempdir().unwrap();
        let short = KEY_ENCODING.encode([7u8; 16]);
        let result = provider(dir.path().join(".master_key"), Some(short)).resolve();
        assert!(matches!(result, Err(SecretError::KeyUnavailable(_))));
    }

    #[test]
    fn test_unreadable_key_file_is_unavailable() {
        let dir = tempdir().unwrap();
        // a directory where the key file should be
        let key_path = dir.path().join(".master_key");
        fs::create_dir(&key_path).unwrap();

        let result = provider(key_path, None).resolve();
        assert!(matches!(result, Err(SecretError::KeyUnavailable(_))));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = MasterKey::from_bytes([0x41; MASTER_KEY_LEN]);
        let out = format!("{:?}", key);
        assert!(out.contains("REDACTED"));
        assert!(!out.contains(&key.encode()));
    }
}
