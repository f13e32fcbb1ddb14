//! Bearer-token session.
//!
//! The backend issues an opaque token on login. The client never inspects it;
//! it keeps the token in the local store so the customer stays signed in
//! across runs, and forwards it on every authenticated request.

use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::storage::{LocalStore, StorageError, keys};

/// The signed-in state of the current customer.
pub struct AuthSession {
    store: Arc<dyn LocalStore>,
    token: Option<SecretString>,
}

impl AuthSession {
    /// Load the session persisted in `store`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    pub fn load(store: Arc<dyn LocalStore>) -> Result<Self, StorageError> {
        let token = store
            .get(keys::TOKEN)?
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(SecretString::from);

        Ok(Self { store, token })
    }

    /// The current bearer token.
    #[must_use]
    pub const fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.token.is_some()
    }

    /// Store a freshly issued token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the token cannot be persisted. The in-memory
    /// session is updated regardless.
    pub fn sign_in(&mut self, token: SecretString) -> Result<(), StorageError> {
        let persisted = self.store.set(keys::TOKEN, token.expose_secret());
        self.token = Some(token);
        persisted
    }

    /// Forget the token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the persisted token cannot be removed. The
    /// in-memory session is cleared regardless.
    pub fn sign_out(&mut self) -> Result<(), StorageError> {
        self.token = None;
        self.store.remove(keys::TOKEN)
    }
}

/// Duplicate a token for a second owner.
pub(crate) fn copy_token(token: &SecretString) -> SecretString {
    SecretString::from(token.expose_secret().to_owned())
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_session_persists_token() {
        let store = MemoryStore::new();
        let mut session = AuthSession::load(Arc::new(store.clone())).unwrap();
        assert!(!session.is_signed_in());

        session.sign_in(SecretString::from("tok-123")).unwrap();
        assert_eq!(store.get(keys::TOKEN).unwrap().as_deref(), Some("tok-123"));

        let reloaded = AuthSession::load(Arc::new(store.clone())).unwrap();
        assert_eq!(reloaded.token().unwrap().expose_secret(), "tok-123");

        session.sign_out().unwrap();
        assert!(!session.is_signed_in());
        assert!(!store.contains(keys::TOKEN));
    }

    #[test]
    fn test_blank_token_is_ignored() {
        let store = MemoryStore::new();
        store.set(keys::TOKEN, "  \n").unwrap();
        let session = AuthSession::load(Arc::new(store)).unwrap();
        assert!(!session.is_signed_in());
    }

    #[test]
    fn test_debug_redacts_token() {
        let store = MemoryStore::new();
        let mut session = AuthSession::load(Arc::new(store)).unwrap();
        session.sign_in(SecretString::from("super-secret")).unwrap();

        let debug = format!("{session:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }
}
