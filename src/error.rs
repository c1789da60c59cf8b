//! Secure Env Error Types
//!
//! Crate-wide error type and its printable form for the command surface.

use serde::Serialize;
use thiserror::Error;

/// Secret store error
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Master key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Permission error: {0}")]
    Permission(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SecretError {
    /// Stable error category printed by the CLI.
    pub fn code(&self) -> &'static str {
        match self {
            SecretError::KeyUnavailable(_) => "KEY_UNAVAILABLE",
            SecretError::DecryptionFailed(_) => "DECRYPTION_FAILED",
            SecretError::EncryptionFailed(_) => "ENCRYPTION_FAILED",
            SecretError::NotFound(_) => "NOT_FOUND",
            SecretError::Validation(_) => "VALIDATION_ERROR",
            SecretError::Database(_) | SecretError::Io(_) => "STORE_IO_ERROR",
            SecretError::Permission(_) => "PERMISSION_ERROR",
            SecretError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Persistence or integrity failures that must abort a bulk operation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SecretError::Database(_)
                | SecretError::Io(_)
                | SecretError::KeyUnavailable(_)
                | SecretError::EncryptionFailed(_)
                | SecretError::Permission(_)
        )
    }
}

/// Serializable error for command output
#[derive(Debug, Serialize)]
pub struct CommandError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl From<SecretError> for CommandError {
    fn from(error: SecretError) -> Self {
        CommandError {
            code: error.code().to_string(),
            message: error.to_string(),
            details: None,
        }
    }
}

impl From<std::io::Error> for CommandError {
    fn from(error: std::io::Error) -> Self {
        SecretError::from(error).into()
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(error: serde_json::Error) -> Self {
        SecretError::from(error).into()
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "error[{}]: {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for CommandError {}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Command result type
pub type CommandResult<T> = std::result::Result<T, CommandError>;
