//! Command implementations.
//!
//! Each command builds on one [`Storefront`] opened from the environment
//! configuration. Commands that touch the cart or the account first restore
//! the previous session with [`Storefront::start`].

pub mod account;
pub mod cart;
pub mod catalog;
pub mod orders;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;

use tienda_storefront::{FileStore, NoticeLog, Storefront, StorefrontConfig, StorefrontError};

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Storefront(#[from] StorefrontError),

    /// Reading a prompt answer from stdin failed.
    #[error("could not read {what}: {source}")]
    Prompt {
        what: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Open the storefront persisted under the configured data directory.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or the saved session
/// cannot be read.
pub fn open(config: StorefrontConfig, notices: &NoticeLog) -> Result<Storefront, CliError> {
    let store = Arc::new(FileStore::new(config.data_dir.clone()));
    Ok(Storefront::with_parts(
        config,
        store,
        Arc::new(notices.clone()),
    )?)
}

/// Use `given` or prompt for a secret on stdin.
fn secret(what: &'static str, given: Option<String>) -> Result<SecretString, CliError> {
    if let Some(value) = given {
        return Ok(SecretString::from(value));
    }

    let mut stderr = io::stderr();
    // A failed prompt write still leaves stdin readable
    let _ = write!(stderr, "{what}: ");
    let _ = stderr.flush();

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|source| CliError::Prompt { what, source })?;

    Ok(SecretString::from(
        line.trim_end_matches(['\r', '\n']).to_string(),
    ))
}
