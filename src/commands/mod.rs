//! Command handlers
//!
//! One function per `secure-env` subcommand. Handlers write their report to
//! the given writer and return `CommandResult`; the binary prints errors.

pub mod secrets;
pub mod storage;

use std::io;

use zeroize::Zeroizing;

use crate::error::{CommandResult, SecretError};

/// Printed in place of a value unless `--reveal` is given
pub const MASKED_VALUE: &str = "<set>";

/// `list` output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Ask a y/N question; declines by default
pub fn confirm(question: &str) -> CommandResult<bool> {
    let answer = dialoguer::Confirm::new()
        .with_prompt(question)
        .default(false)
        .interact()
        .map_err(|e| SecretError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
    Ok(answer)
}

/// Read a value from the terminal without echo
pub fn prompt_value(name: &str) -> CommandResult<Zeroizing<String>> {
    let value = Zeroizing::new(rpassword::prompt_password(format!("Value for {}: ", name))?);
    if value.is_empty() {
        return Err(SecretError::Validation("empty value, nothing stored".to_string()).into());
    }
    Ok(value)
}
