//! Unified error handling with Sentry integration.
//!
//! Every storefront operation returns `Result<T, StorefrontError>`. Errors are
//! caught at the operation boundary, logged, turned into a notification and
//! handed back to the caller; none of them is fatal. Failures that point at
//! the backend or the local disk are also captured to Sentry.

use thiserror::Error;

use tienda_core::{EmailError, QuantityError};

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::storage::StorageError;

/// Minimum password length accepted by the backend.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Input rejected before any I/O happened.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Quantity below 1 (or absurdly large).
    #[error("{0}")]
    Quantity(#[from] QuantityError),

    /// Malformed email address.
    #[error("invalid email: {0}")]
    Email(#[from] EmailError),

    /// Password shorter than the backend minimum.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,

    /// New password and its confirmation differ.
    #[error("new passwords do not match")]
    PasswordMismatch,

    /// A required text field was blank.
    #[error("{0} is required")]
    Required(&'static str),

    /// Checkout attempted with nothing in the cart.
    #[error("the cart is empty")]
    EmptyCart,
}

/// Application-level error type for the storefront client.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Input failed client-side validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Backend request failed (transport, timeout, non-2xx, bad body).
    #[error("Network error: {0}")]
    Network(#[from] ApiError),

    /// The persisted local cart could not be parsed.
    #[error("Corrupt local cart: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// The cart could not be encoded for the local store.
    #[error("Could not encode local cart: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Reading or writing the local store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The operation needs a signed-in customer.
    #[error("Not signed in")]
    NotSignedIn,

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl StorefrontError {
    /// Whether this error originated before any I/O.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether the backend rejected the bearer token.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Network(ApiError::Unauthorized(_)))
    }

    /// Log the error and capture it to Sentry when it is worth investigating.
    ///
    /// Validation failures and expired sessions are user mistakes and are only
    /// logged at debug level.
    pub fn report(&self) {
        match self {
            Self::Network(ApiError::Unauthorized(_)) | Self::NotSignedIn | Self::Validation(_) => {
                tracing::debug!(error = %self, "Operation rejected");
            }
            Self::Network(ApiError::Status { status, .. }) if *status < 500 => {
                tracing::warn!(error = %self, "Backend refused request");
            }
            _ => {
                let event_id = sentry::capture_error(self);
                tracing::error!(
                    error = %self,
                    sentry_event_id = %event_id,
                    "Operation failed"
                );
            }
        }
    }
}

impl From<QuantityError> for StorefrontError {
    fn from(err: QuantityError) -> Self {
        Self::Validation(err.into())
    }
}

impl From<EmailError> for StorefrontError {
    fn from(err: EmailError) -> Self {
        Self::Validation(err.into())
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart and
/// account actions leading up to an error.
///
/// # Example
///
/// ```rust
/// tienda_storefront::error::add_breadcrumb("cart", "Added item", Some(&[("product_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
