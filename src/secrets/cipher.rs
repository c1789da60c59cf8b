//! Value encryption/decryption
//!
//! Token format (v1), URL-safe base64 of:
//! - version: `0x01` (1 byte)
//! - nonce: 24 bytes (XChaCha20-Poly1305)
//! - ciphertext: AEAD output (= ciphertext + 16-byte tag)
//!
//! AAD: the version byte (format binding)

use base64::{engine::general_purpose::URL_SAFE as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Result, SecretError};
use crate::secrets::master_key::MasterKey;

/// Token format version
pub const TOKEN_VERSION: u8 = 1;

/// PBKDF2 iteration count
pub const KDF_ROUNDS: u32 = 100_000;

/// Derived key length (256-bit)
pub const CIPHER_KEY_LEN: usize = 32;

/// Salt length
pub const SALT_LEN: usize = 16;

/// Nonce length (24 bytes for XChaCha20-Poly1305)
pub const NONCE_LEN: usize = 24;

const TAG_LEN: usize = 16;

/// Per-store encryption key, derived from the master key
pub struct CipherKey {
    bytes: Zeroizing<[u8; CIPHER_KEY_LEN]>,
}

impl CipherKey {
    /// PBKDF2-HMAC-SHA256 over the master key bytes.
    pub fn derive(master_key: &MasterKey, salt: &[u8]) -> Self {
        let mut bytes = Zeroizing::new([0u8; CIPHER_KEY_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha256>(master_key.expose(), salt, KDF_ROUNDS, &mut bytes[..]);
        Self { bytes }
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        let key: &[u8; CIPHER_KEY_LEN] = &self.bytes;
        XChaCha20Poly1305::new(key.into())
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherKey([REDACTED])")
    }
}

/// Generate a fresh random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Encrypt a value into a self-contained token.
pub fn encrypt(key: &CipherKey, plaintext: &str) -> Result<String> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let header = [TOKEN_VERSION];
    let ciphertext = key
        .cipher()
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext.as_bytes(),
                aad: &header,
            },
        )
        .map_err(|e| SecretError::EncryptionFailed(e.to_string()))?;

    let mut raw = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
    raw.extend_from_slice(&header);
    raw.extend_from_slice(&nonce);
    raw.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(raw))
}

/// Verify and decrypt a token.
pub fn decrypt(key: &CipherKey, token: &str) -> Result<String> {
    let raw = BASE64
        .decode(token.trim())
        .map_err(|_| SecretError::DecryptionFailed("malformed token encoding".to_string()))?;

    if raw.len() < 1 + NONCE_LEN + TAG_LEN {
        return Err(SecretError::DecryptionFailed("token too short".to_string()));
    }

    let (header, rest) = raw.split_at(1);
    if header[0] != TOKEN_VERSION {
        return Err(SecretError::DecryptionFailed(format!(
            "unsupported token version {}",
            header[0]
        )));
    }
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let mut plaintext = key
        .cipher()
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: header,
            },
        )
        .map_err(|_| {
            SecretError::DecryptionFailed("integrity check failed (tampered token or wrong key)".to_string())
        })?;

    let value = std::str::from_utf8(&plaintext)
        .map(str::to_owned)
        .map_err(|_| SecretError::DecryptionFailed("plaintext is not valid UTF-8".to_string()));

    // wipe the intermediate buffer
    plaintext.zeroize();

    value
}
