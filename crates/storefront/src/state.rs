//! The storefront session: configuration, API client, auth and cart.
//!
//! [`Storefront`] is the single context object a front end owns. It wires the
//! local store, the bearer-token session and the cart manager together and
//! drives the session transitions (start, login, logout, expiry) so the cart
//! always follows the authentication state.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{info, instrument, warn};

use tienda_core::{Email, Order, PaymentMethod, Product, ProductId, UserProfile};

use crate::api::account::validate_password;
use crate::api::{ApiClient, CheckoutRequest, PasswordChange, ProfileUpdate, Registration};
use crate::cart::CartManager;
use crate::config::StorefrontConfig;
use crate::error::{
    Result, StorefrontError, ValidationError, clear_sentry_user, set_sentry_user,
};
use crate::notify::{Notice, Notifier, TracingNotifier, keys as notice};
use crate::session::{AuthSession, copy_token};
use crate::storage::{FileStore, LocalStore};

/// A customer's storefront session.
pub struct Storefront {
    config: StorefrontConfig,
    api: ApiClient,
    notifier: Arc<dyn Notifier>,
    session: AuthSession,
    cart: CartManager<ApiClient>,
}

impl Storefront {
    /// Build a storefront persisting to `config.data_dir` and reporting
    /// notices through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the persisted
    /// session cannot be read.
    pub fn new(config: StorefrontConfig) -> Result<Self> {
        let store = Arc::new(FileStore::new(config.data_dir.clone()));
        Self::with_parts(config, store, Arc::new(TracingNotifier))
    }

    /// Build a storefront from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the persisted
    /// session cannot be read.
    pub fn with_parts(
        config: StorefrontConfig,
        store: Arc<dyn LocalStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let api = ApiClient::new(&config)?;
        let session = AuthSession::load(Arc::clone(&store))?;
        let cart = CartManager::new(api.clone(), store, Arc::clone(&notifier));

        Ok(Self {
            config,
            api,
            notifier,
            session,
            cart,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &StorefrontConfig {
        &self.config
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub const fn session(&self) -> &AuthSession {
        &self.session
    }

    #[must_use]
    pub const fn cart(&self) -> &CartManager<ApiClient> {
        &self.cart
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Restore the previous session.
    ///
    /// With a persisted token the token is checked against `/auth/me`; a
    /// valid token switches the cart to the server cart, a rejected one is
    /// dropped and the anonymous cart is loaded instead. Without a token the
    /// anonymous cart is loaded from the local store.
    ///
    /// Returns the signed-in user, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached to validate a token,
    /// or if the local store cannot be read.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<Option<UserProfile>> {
        if let Some(token) = self.session.token().map(copy_token) {
            match self.api.me(&token).await {
                Ok(user) => {
                    set_sentry_user(&user.id, Some(user.email.as_str()));
                    let synced = self.cart.sign_in(token).await;
                    match self.check_cart(synced) {
                        Ok(()) => return Ok(Some(user)),
                        // Token refused while syncing: fall back to the local cart
                        Err(e) if e.is_unauthorized() => {}
                        Err(e) => {
                            warn!(error = %e, "Cart synchronization failed during start");
                            return Ok(Some(user));
                        }
                    }
                }
                Err(e) => {
                    let err = StorefrontError::from(e);
                    if !is_rejection(&err) {
                        err.report();
                        return Err(err);
                    }
                    self.expire_session();
                }
            }
        }

        self.load_local_cart()?;
        Ok(None)
    }

    /// Sign in with email and password.
    ///
    /// A previous session is ended first. On success the anonymous cart is
    /// merged into the server cart.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed email or short password, or
    /// the backend's rejection.
    #[instrument(skip(self, password))]
    pub async fn login(&mut self, email: &str, password: SecretString) -> Result<UserProfile> {
        let email = match Email::parse(email) {
            Ok(email) => email,
            Err(e) => return Err(self.fail(notice::LOGIN_ERROR, "Could not sign in", e.into())),
        };
        if let Err(e) = validate_password(&password) {
            return Err(self.fail(notice::LOGIN_ERROR, "Could not sign in", e.into()));
        }

        if self.session.is_signed_in() {
            self.end_session()?;
        }

        let token = match self.api.login(&email, &password).await {
            Ok(token) => token,
            Err(e) => return Err(self.fail(notice::LOGIN_ERROR, "Could not sign in", e.into())),
        };
        let user = match self.api.me(&token).await {
            Ok(user) => user,
            Err(e) => return Err(self.fail(notice::LOGIN_ERROR, "Could not sign in", e.into())),
        };

        self.session.sign_in(copy_token(&token))?;
        set_sentry_user(&user.id, Some(user.email.as_str()));
        info!(user_id = %user.id, "Signed in");
        self.notifier.notify(Notice::success(
            notice::SIGNED_IN,
            format!("Welcome, {}", user.name),
        ));

        // Merge failures are notified by the cart and do not undo the login,
        // unless the token was refused right away
        let synced = self.cart.sign_in(token).await;
        if let Err(e) = self.check_cart(synced) {
            if e.is_unauthorized() {
                return Err(e);
            }
            warn!(error = %e, "Cart synchronization failed after login");
        }

        Ok(user)
    }

    /// Sign out. The cart is emptied and not written back locally.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the persisted token cannot be removed.
    #[instrument(skip(self))]
    pub fn logout(&mut self) -> Result<()> {
        self.end_session()?;
        self.notifier
            .notify(Notice::success(notice::SIGNED_OUT, "You have been signed out"));
        Ok(())
    }

    /// Fetch the signed-in user. A rejected token ends the session.
    ///
    /// # Errors
    ///
    /// Returns `NotSignedIn` without a session, or the backend failure.
    #[instrument(skip(self))]
    pub async fn current_user(&mut self) -> Result<UserProfile> {
        let token = self.token()?;
        match self.api.me(&token).await {
            Ok(user) => Ok(user),
            Err(e) => Err(self.fail(notice::ACCOUNT_ERROR, "Could not load your account", e.into())),
        }
    }

    // =========================================================================
    // Account
    // =========================================================================

    /// Create an account. Returns the backend's confirmation message.
    ///
    /// # Errors
    ///
    /// Returns the backend failure (e.g. email already registered).
    #[instrument(skip_all, fields(email = %registration.email))]
    pub async fn register(&mut self, registration: &Registration) -> Result<String> {
        match self.api.register(registration).await {
            Ok(message) => Ok(message),
            Err(e) => Err(self.fail(notice::REGISTER_ERROR, "Could not register", e.into())),
        }
    }

    /// # Errors
    ///
    /// Returns `NotSignedIn` without a session, or the backend failure.
    #[instrument(skip(self))]
    pub async fn profile(&mut self) -> Result<UserProfile> {
        let token = self.token()?;
        match self.api.profile(&token).await {
            Ok(user) => Ok(user),
            Err(e) => Err(self.fail(notice::PROFILE_ERROR, "Could not load your profile", e.into())),
        }
    }

    /// Save profile changes and return the updated profile.
    ///
    /// # Errors
    ///
    /// Returns `NotSignedIn` without a session, or the backend failure.
    #[instrument(skip_all)]
    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> Result<UserProfile> {
        let token = self.token()?;
        if let Err(e) = self.api.update_profile(&token, update).await {
            return Err(self.fail(notice::PROFILE_ERROR, "Could not update your profile", e.into()));
        }
        self.notifier
            .notify(Notice::success(notice::PROFILE_UPDATED, "Profile updated"));
        self.profile().await
    }

    /// # Errors
    ///
    /// Returns `NotSignedIn` without a session, or the backend failure (e.g.
    /// wrong current password).
    #[instrument(skip_all)]
    pub async fn change_password(&mut self, change: &PasswordChange) -> Result<String> {
        let token = self.token()?;
        match self.api.change_password(&token, change).await {
            Ok(message) => {
                self.notifier
                    .notify(Notice::success(notice::PASSWORD_CHANGED, message.clone()));
                Ok(message)
            }
            Err(e) => Err(self.fail(notice::PASSWORD_ERROR, "Could not change your password", e.into())),
        }
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Add `quantity` units of `product` to the cart.
    ///
    /// # Errors
    ///
    /// Returns the cart failure. A token the backend refuses also ends the
    /// session.
    pub async fn add_to_cart(&mut self, product: Product, quantity: i64) -> Result<()> {
        let result = self.cart.add_item(product, quantity).await;
        self.check_cart(result)
    }

    /// # Errors
    ///
    /// Returns the cart failure. A token the backend refuses also ends the
    /// session.
    pub async fn update_cart_item(&mut self, product_id: ProductId, quantity: i64) -> Result<()> {
        let result = self.cart.update_quantity(product_id, quantity).await;
        self.check_cart(result)
    }

    /// # Errors
    ///
    /// Returns the cart failure. A token the backend refuses also ends the
    /// session.
    pub async fn remove_from_cart(&mut self, product_id: ProductId) -> Result<()> {
        let result = self.cart.remove_item(product_id).await;
        self.check_cart(result)
    }

    /// # Errors
    ///
    /// Returns the cart failure. A token the backend refuses also ends the
    /// session.
    pub async fn clear_cart(&mut self) -> Result<()> {
        let result = self.cart.clear().await;
        self.check_cart(result)
    }

    /// Re-read the server cart. Does nothing while anonymous.
    ///
    /// # Errors
    ///
    /// Returns the cart failure. A token the backend refuses also ends the
    /// session.
    pub async fn refresh_cart(&mut self) -> Result<()> {
        let result = self.cart.fetch_remote_cart().await;
        self.check_cart(result)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Place an order for the current cart, then empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `NotSignedIn` without a session, a validation error for a blank
    /// address or empty cart (both checked before any request), or the
    /// backend failure.
    #[instrument(skip(self, address))]
    pub async fn checkout(&mut self, address: &str, method: PaymentMethod) -> Result<Order> {
        let token = self.token()?;

        let address = address.trim();
        if address.is_empty() {
            let err = ValidationError::Required("shipping address").into();
            return Err(self.fail(notice::CHECKOUT_ERROR, "Could not place the order", err));
        }
        if self.cart.cart().is_empty() {
            let err = ValidationError::EmptyCart.into();
            return Err(self.fail(notice::CHECKOUT_ERROR, "Could not place the order", err));
        }

        let request = CheckoutRequest {
            shipping_address: address.to_string(),
            payment_method: method,
        };
        let order = match self.api.checkout(&token, &request).await {
            Ok(order) => order,
            Err(e) => {
                return Err(self.fail(notice::CHECKOUT_ERROR, "Could not place the order", e.into()));
            }
        };

        info!(order_id = %order.id, total = %order.total, "Order placed");
        self.notifier.notify(Notice::success(
            notice::ORDER_PLACED,
            format!("Order #{} placed", order.id),
        ));

        // The order stands even if emptying the cart fails; the cart notifies
        if let Err(e) = self.clear_cart().await {
            warn!(error = %e, "Could not clear the cart after checkout");
        }

        Ok(order)
    }

    /// The customer's order history.
    ///
    /// # Errors
    ///
    /// Returns `NotSignedIn` without a session, or the backend failure.
    #[instrument(skip(self))]
    pub async fn orders(&mut self) -> Result<Vec<Order>> {
        let token = self.token()?;
        match self.api.orders(&token).await {
            Ok(orders) => Ok(orders),
            Err(e) => Err(self.fail(notice::ORDERS_ERROR, "Could not load your orders", e.into())),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn token(&self) -> Result<SecretString> {
        self.session
            .token()
            .map(copy_token)
            .ok_or(StorefrontError::NotSignedIn)
    }

    /// Load the anonymous cart. A corrupt entry has already been reset and
    /// notified, so only storage failures are fatal here.
    fn load_local_cart(&mut self) -> Result<()> {
        match self.cart.reload_local() {
            Err(StorefrontError::Deserialization(_)) | Ok(()) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn end_session(&mut self) -> Result<()> {
        self.cart.sign_out();
        clear_sentry_user();
        self.session.sign_out()?;
        Ok(())
    }

    /// Drop a token the backend no longer accepts and fall back to the
    /// anonymous cart.
    fn expire_session(&mut self) {
        if let Err(e) = self.end_session() {
            warn!(error = %e, "Could not remove expired token");
        }
        info!("Session expired");
        self.notifier.notify(Notice::error(
            notice::SESSION_EXPIRED,
            "Your session has expired, please sign in again",
        ));
    }

    /// End the session when the backend refused the token during a cart
    /// operation. The cart has already reported and notified the failure.
    fn check_cart<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_unauthorized()
            && self.session.is_signed_in()
        {
            self.expire_session();
        }
        result
    }

    /// Log, report and notify a failure, ending the session if the backend
    /// rejected the token.
    fn fail(&mut self, key: &'static str, context: &str, err: StorefrontError) -> StorefrontError {
        err.report();
        if err.is_unauthorized() && self.session.is_signed_in() {
            self.expire_session();
        } else {
            self.notifier
                .notify(Notice::error(key, format!("{context}: {err}")));
        }
        err
    }
}

/// Whether `/auth/me` refused the token itself, as opposed to being
/// unreachable or failing internally.
fn is_rejection(err: &StorefrontError) -> bool {
    match err {
        StorefrontError::Network(crate::api::ApiError::Unauthorized(_)) => true,
        StorefrontError::Network(crate::api::ApiError::Status { status, .. }) => {
            (400..500).contains(status)
        }
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::notify::NoticeLog;
    use crate::storage::{MemoryStore, keys};

    /// Points at a closed port: any request that slips through fails.
    fn storefront(store: &MemoryStore, notices: &NoticeLog) -> Storefront {
        let config = StorefrontConfig::for_api_url("http://127.0.0.1:9/api", "/unused").unwrap();
        Storefront::with_parts(config, Arc::new(store.clone()), Arc::new(notices.clone())).unwrap()
    }

    fn signed_in_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.set(keys::TOKEN, "tok-abc").unwrap();
        store
    }

    #[tokio::test]
    async fn test_checkout_requires_session() {
        let store = MemoryStore::new();
        let mut storefront = storefront(&store, &NoticeLog::new());

        let err = storefront
            .checkout("Calle 1", PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(matches!(err, StorefrontError::NotSignedIn));
    }

    #[tokio::test]
    async fn test_checkout_validates_before_io() {
        let store = signed_in_store();
        let notices = NoticeLog::new();
        let mut storefront = storefront(&store, &notices);

        let err = storefront
            .checkout("   ", PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorefrontError::Validation(ValidationError::Required("shipping address"))
        ));

        let err = storefront
            .checkout("Calle 1", PaymentMethod::Cash)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorefrontError::Validation(ValidationError::EmptyCart)
        ));
        assert_eq!(
            notices.keys(),
            vec![notice::CHECKOUT_ERROR, notice::CHECKOUT_ERROR]
        );
    }

    #[tokio::test]
    async fn test_login_validates_before_io() {
        let store = MemoryStore::new();
        let mut storefront = storefront(&store, &NoticeLog::new());

        let err = storefront
            .login("not-an-email", SecretString::from("hunter22".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorefrontError::Validation(ValidationError::Email(_))
        ));

        let err = storefront
            .login("ana@example.com", SecretString::from("123".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorefrontError::Validation(ValidationError::WeakPassword)
        ));
    }

    #[tokio::test]
    async fn test_logout_forgets_token() {
        let store = signed_in_store();
        let notices = NoticeLog::new();
        let mut storefront = storefront(&store, &notices);
        assert!(storefront.session().is_signed_in());

        storefront.logout().unwrap();

        assert!(!storefront.session().is_signed_in());
        assert!(!store.contains(keys::TOKEN));
        assert_eq!(notices.keys(), vec![notice::SIGNED_OUT]);
    }

    #[tokio::test]
    async fn test_start_without_token_loads_local_cart() {
        let store = MemoryStore::new();
        store
            .set(
                keys::CART,
                r#"[{"id":1,"product":{"id":1,"nombre":"Taza","precio":"4.5"},"cantidad":2}]"#,
            )
            .unwrap();
        let mut storefront = storefront(&store, &NoticeLog::new());

        let user = storefront.start().await.unwrap();

        assert!(user.is_none());
        assert_eq!(storefront.cart().total_units(), 2);
        assert_eq!(storefront.cart().subtotal().to_string(), "$9.00");
    }

    #[tokio::test]
    async fn test_start_with_unreachable_backend_keeps_token() {
        let store = signed_in_store();
        let mut storefront = storefront(&store, &NoticeLog::new());

        let err = storefront.start().await.unwrap_err();

        assert!(matches!(err, StorefrontError::Network(ApiError::Http(_))));
        assert!(store.contains(keys::TOKEN));
    }

    #[tokio::test]
    async fn test_current_user_outage_keeps_session() {
        let store = signed_in_store();
        let notices = NoticeLog::new();
        let mut storefront = storefront(&store, &notices);

        let err = storefront.current_user().await.unwrap_err();

        assert!(matches!(err, StorefrontError::Network(ApiError::Http(_))));
        assert!(storefront.session().is_signed_in());
        assert_eq!(notices.keys(), vec![notice::ACCOUNT_ERROR]);
    }

    #[test]
    fn test_rejection_classification() {
        assert!(is_rejection(&StorefrontError::Network(ApiError::Unauthorized(
            "Token inválido".to_string()
        ))));
        assert!(is_rejection(&StorefrontError::Network(ApiError::Status {
            status: 403,
            message: "Prohibido".to_string(),
        })));
        assert!(!is_rejection(&StorefrontError::Network(ApiError::Status {
            status: 503,
            message: "Unavailable".to_string(),
        })));
    }
}
