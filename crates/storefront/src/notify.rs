//! User-visible notifications.
//!
//! Operations report their outcome as short, non-blocking notices (the
//! storefront equivalent of a toast). Each notice carries a stable key so a
//! front end can de-duplicate repeated messages.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A single user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    /// Stable identifier, e.g. `add-success`.
    pub key: &'static str,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn success(key: &'static str, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            key,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(key: &'static str, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            key,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            NoticeLevel::Success => write!(f, "✓ {}", self.message),
            NoticeLevel::Error => write!(f, "✗ {}", self.message),
        }
    }
}

/// Notice keys used by the storefront.
pub mod keys {
    pub const ADD_SUCCESS: &str = "add-success";
    pub const ADD_ERROR: &str = "add-error";
    pub const INVALID_QUANTITY: &str = "invalid-quantity";
    pub const UPDATED_QUANTITY: &str = "updated-quantity";
    pub const UPDATE_ERROR: &str = "update-error";
    pub const REMOVE_SUCCESS: &str = "remove-success";
    pub const REMOVE_ERROR: &str = "remove-error";
    pub const CLEAR_SUCCESS: &str = "clear-success";
    pub const CLEAR_ERROR: &str = "clear-error";
    pub const FETCH_ERROR: &str = "fetch-error";
    pub const SYNC_SUCCESS: &str = "ok-sync";
    pub const SYNC_ERROR: &str = "sync-error";
    pub const LOCAL_CART_CORRUPT: &str = "local-cart-corrupt";
    pub const STORAGE_ERROR: &str = "storage-error";
    pub const SIGNED_IN: &str = "signed-in";
    pub const LOGIN_ERROR: &str = "login-error";
    pub const SIGNED_OUT: &str = "signed-out";
    pub const SESSION_EXPIRED: &str = "session-expired";
    pub const ACCOUNT_ERROR: &str = "account-error";
    pub const REGISTER_ERROR: &str = "register-error";
    pub const PROFILE_UPDATED: &str = "profile-updated";
    pub const PROFILE_ERROR: &str = "profile-error";
    pub const PASSWORD_CHANGED: &str = "password-changed";
    pub const PASSWORD_ERROR: &str = "password-error";
    pub const ORDER_PLACED: &str = "order-placed";
    pub const ORDERS_ERROR: &str = "orders-error";
    pub const CHECKOUT_ERROR: &str = "checkout-error";
}

/// Sink for notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Forwards notices to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => {
                tracing::info!(key = notice.key, "{}", notice.message);
            }
            NoticeLevel::Error => {
                tracing::warn!(key = notice.key, "{}", notice.message);
            }
        }
    }
}

/// Collects notices for later display. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct NoticeLog {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl NoticeLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every notice recorded so far.
    #[must_use]
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Copy of the recorded notices.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Keys of the recorded notices, in order.
    #[must_use]
    pub fn keys(&self) -> Vec<&'static str> {
        self.snapshot().iter().map(|n| n.key).collect()
    }
}

impl Notifier for NoticeLog {
    fn notify(&self, notice: Notice) {
        tracing::debug!(key = notice.key, "Notice recorded");
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}
