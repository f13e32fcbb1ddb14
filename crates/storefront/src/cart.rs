//! Cart state manager.
//!
//! Keeps the shopping cart in memory and decides where each mutation goes:
//!
//! - **Anonymous**: mutations apply to the in-memory [`Cart`] and the result is
//!   written to the local store after every change.
//! - **Authenticated**: mutations are sent to the backend and the whole server
//!   cart is re-read afterwards. Memory is only a read-through copy.
//!
//! The first time a token shows up the anonymous cart is folded into the
//! server cart exactly once (see [`CartManager::sign_in`]).
//!
//! Every failure is logged, reported as a [`Notice`] and returned. A failed
//! remote call never touches the in-memory cart.

use std::fmt;
use std::sync::Arc;

use secrecy::SecretString;
use tracing::{debug, info, instrument, warn};

use tienda_core::{Cart, CartItem, MergeStep, Price, Product, ProductId, Quantity, plan_merge};

use crate::api::CartApi;
use crate::error::{Result, StorefrontError, add_breadcrumb};
use crate::notify::{Notice, Notifier, keys as notice};
use crate::session::copy_token;
use crate::storage::{LocalStore, keys};

/// Where cart mutations are applied.
pub enum CartPhase {
    /// No token: the local store is the source of truth.
    Anonymous,
    /// A token was just acquired and the local cart is being merged.
    Reconciling { token: SecretString },
    /// The server cart is the source of truth.
    Authenticated { token: SecretString },
}

impl CartPhase {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Reconciling { .. } => "reconciling",
            Self::Authenticated { .. } => "authenticated",
        }
    }

    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// The token remote calls are made with.
    const fn token(&self) -> Option<&SecretString> {
        match self {
            Self::Anonymous => None,
            Self::Reconciling { token } | Self::Authenticated { token } => Some(token),
        }
    }
}

impl fmt::Debug for CartPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Owns the session's cart and keeps it in sync with local or remote storage.
pub struct CartManager<A> {
    api: A,
    store: Arc<dyn LocalStore>,
    notifier: Arc<dyn Notifier>,
    phase: CartPhase,
    cart: Cart,
}

impl<A: CartApi> CartManager<A> {
    /// An anonymous manager with an empty cart. Call
    /// [`reload_local`](Self::reload_local) or [`sign_in`](Self::sign_in) to
    /// populate it.
    pub fn new(api: A, store: Arc<dyn LocalStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            store,
            notifier,
            phase: CartPhase::Anonymous,
            cart: Cart::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[must_use]
    pub const fn phase(&self) -> &CartPhase {
        &self.phase
    }

    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        self.cart.items()
    }

    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.cart.subtotal()
    }

    #[must_use]
    pub fn total_units(&self) -> u64 {
        self.cart.total_units()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of `product`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for quantities below 1, or the remote or
    /// storage failure that stopped the change.
    #[instrument(skip(self, product), fields(product_id = %product.id, phase = self.phase.name()))]
    pub async fn add_item(&mut self, product: Product, quantity: i64) -> Result<()> {
        let quantity = match Quantity::new(quantity) {
            Ok(q) => q,
            Err(e) => return Err(self.fail(notice::INVALID_QUANTITY, "Invalid quantity", e.into())),
        };
        let product_id = product.id;
        let name = product.name.clone();

        if let Some(token) = self.remote_token() {
            if let Err(e) = self.api.add_item(&token, product_id, quantity).await {
                return Err(self.fail(notice::ADD_ERROR, "Could not add to cart", e.into()));
            }
            self.refresh(&token).await?;
        } else {
            self.cart.add(product, quantity);
            self.persist()?;
        }

        let (id, units) = (product_id.to_string(), quantity.to_string());
        add_breadcrumb(
            "cart",
            "Added item",
            Some(&[("product_id", id.as_str()), ("quantity", units.as_str())]),
        );
        self.notify(Notice::success(
            notice::ADD_SUCCESS,
            format!("{name} added to the cart"),
        ));
        Ok(())
    }

    /// Replace the quantity of a line. A product not in the cart is left alone.
    ///
    /// # Errors
    ///
    /// Returns a validation error for quantities below 1, or the remote or
    /// storage failure that stopped the change.
    #[instrument(skip(self), fields(phase = self.phase.name()))]
    pub async fn update_quantity(&mut self, product_id: ProductId, quantity: i64) -> Result<()> {
        let quantity = match Quantity::new(quantity) {
            Ok(q) => q,
            Err(e) => return Err(self.fail(notice::INVALID_QUANTITY, "Invalid quantity", e.into())),
        };

        if let Some(token) = self.remote_token() {
            if let Err(e) = self.api.update_item(&token, product_id, quantity).await {
                return Err(self.fail(notice::UPDATE_ERROR, "Could not update quantity", e.into()));
            }
            self.refresh(&token).await?;
        } else {
            if !self.cart.set_quantity(product_id, quantity) {
                debug!("Product not in cart, nothing to update");
                return Ok(());
            }
            self.persist()?;
        }

        let (id, units) = (product_id.to_string(), quantity.to_string());
        add_breadcrumb(
            "cart",
            "Updated quantity",
            Some(&[("product_id", id.as_str()), ("quantity", units.as_str())]),
        );
        self.notify(Notice::success(
            notice::UPDATED_QUANTITY,
            format!("Quantity set to {quantity}"),
        ));
        Ok(())
    }

    /// Drop a line. Removing a product that is not in the cart does nothing.
    ///
    /// While signed in the delete is always sent, since the server cart may
    /// hold lines this copy has not seen yet. A not-found answer counts as
    /// nothing to remove.
    ///
    /// # Errors
    ///
    /// Returns the remote or storage failure that stopped the change.
    #[instrument(skip(self), fields(phase = self.phase.name()))]
    pub async fn remove_item(&mut self, product_id: ProductId) -> Result<()> {
        if let Some(token) = self.remote_token() {
            match self.api.remove_item(&token, product_id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!("Product not in server cart, nothing to remove");
                    return self.refresh(&token).await;
                }
                Err(e) => {
                    return Err(self.fail(notice::REMOVE_ERROR, "Could not remove item", e.into()));
                }
            }
            self.refresh(&token).await?;
        } else {
            if !self.cart.contains(product_id) {
                debug!("Product not in cart, nothing to remove");
                return Ok(());
            }
            self.cart.remove(product_id);
            self.persist()?;
        }

        let id = product_id.to_string();
        add_breadcrumb("cart", "Removed item", Some(&[("product_id", id.as_str())]));
        self.notify(Notice::success(
            notice::REMOVE_SUCCESS,
            "Item removed from the cart",
        ));
        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns the remote or storage failure that stopped the change.
    #[instrument(skip(self), fields(phase = self.phase.name()))]
    pub async fn clear(&mut self) -> Result<()> {
        if let Some(token) = self.remote_token() {
            if let Err(e) = self.api.clear_cart(&token).await {
                return Err(self.fail(notice::CLEAR_ERROR, "Could not clear the cart", e.into()));
            }
            self.cart.clear();
        } else {
            self.cart.clear();
            if let Err(e) = self.store.remove(keys::CART) {
                return Err(self.fail(notice::STORAGE_ERROR, "Could not save the cart", e.into()));
            }
        }

        add_breadcrumb("cart", "Cleared cart", None);
        self.notify(Notice::success(notice::CLEAR_SUCCESS, "Cart emptied"));
        Ok(())
    }

    /// Replace the in-memory cart with the server cart. Does nothing while
    /// anonymous.
    ///
    /// # Errors
    ///
    /// Returns the remote failure; the in-memory cart is left as it was.
    #[instrument(skip(self), fields(phase = self.phase.name()))]
    pub async fn fetch_remote_cart(&mut self) -> Result<()> {
        match self.remote_token() {
            Some(token) => self.refresh(&token).await,
            None => Ok(()),
        }
    }

    // =========================================================================
    // Session transitions
    // =========================================================================

    /// Load the anonymous cart from the local store.
    ///
    /// Only meaningful while anonymous; otherwise the server cart is the
    /// source of truth and this does nothing. A corrupt entry is discarded
    /// and the cart starts empty.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Deserialization` for a corrupt entry, or a
    /// storage error.
    #[instrument(skip(self), fields(phase = self.phase.name()))]
    pub fn reload_local(&mut self) -> Result<()> {
        if !self.phase.is_anonymous() {
            debug!("Signed in, local cart not consulted");
            return Ok(());
        }

        match self.read_local() {
            Ok(cart) => {
                self.cart = cart.unwrap_or_default();
                debug!(items = self.cart.len(), "Loaded local cart");
                Ok(())
            }
            Err(e) => {
                self.cart = Cart::new();
                Err(e)
            }
        }
    }

    /// Switch to the server cart, merging the local cart into it once.
    ///
    /// Every local line is applied to the server cart in order: products the
    /// server already has get the summed quantity, others are added. The
    /// server cart is then re-read and the local entry removed.
    ///
    /// Calling this while already signed in does nothing. If the merge fails
    /// part-way the local entry is kept so nothing is lost, and the manager is
    /// still authenticated afterwards.
    ///
    /// # Errors
    ///
    /// Returns the failure that interrupted the merge.
    #[instrument(skip_all, fields(phase = self.phase.name()))]
    pub async fn sign_in(&mut self, token: SecretString) -> Result<()> {
        if !self.phase.is_anonymous() {
            debug!("Cart already synchronized for this session");
            return Ok(());
        }

        // A corrupt local cart has already been discarded and notified
        let local = self.read_local().ok().flatten().unwrap_or_default();

        self.phase = CartPhase::Reconciling {
            token: copy_token(&token),
        };
        let result = self.reconcile(&token, &local).await;
        self.phase = CartPhase::Authenticated { token };

        if let Err(e) = result {
            return Err(self.fail(notice::SYNC_ERROR, "Could not synchronize the cart", e));
        }

        if !local.is_empty() {
            if let Err(e) = self.store.remove(keys::CART) {
                return Err(self.fail(notice::STORAGE_ERROR, "Could not remove the saved cart", e.into()));
            }
            self.notify(Notice::success(
                notice::SYNC_SUCCESS,
                "Cart synchronized with your account",
            ));
        }
        info!(items = self.cart.len(), "Cart synchronized");
        Ok(())
    }

    /// Back to anonymous mode. The cart is emptied and nothing is written to
    /// the local store.
    #[instrument(skip_all, fields(phase = self.phase.name()))]
    pub fn sign_out(&mut self) {
        self.phase = CartPhase::Anonymous;
        self.cart.clear();
        debug!("Cart reset after sign-out");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn reconcile(&mut self, token: &SecretString, local: &Cart) -> Result<()> {
        let remote = self.api.fetch_cart(token).await?;

        if local.is_empty() {
            self.cart = remote;
            return Ok(());
        }

        let steps = plan_merge(local, &remote);
        self.cart = remote;
        debug!(steps = steps.len(), "Merging local cart into server cart");

        for step in steps {
            match step {
                MergeStep::Update {
                    product_id,
                    quantity,
                } => self.api.update_item(token, product_id, quantity).await?,
                MergeStep::Add {
                    product_id,
                    quantity,
                } => self.api.add_item(token, product_id, quantity).await?,
            }
        }

        self.cart = self.api.fetch_cart(token).await?;
        Ok(())
    }

    /// Re-read the server cart after a mutation.
    async fn refresh(&mut self, token: &SecretString) -> Result<()> {
        match self.api.fetch_cart(token).await {
            Ok(cart) => {
                self.cart = cart;
                Ok(())
            }
            Err(e) => Err(self.fail(notice::FETCH_ERROR, "Could not load the cart", e.into())),
        }
    }

    /// Read the persisted anonymous cart, discarding it when corrupt.
    fn read_local(&self) -> Result<Option<Cart>> {
        let raw = match self.store.get(keys::CART) {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(notice::STORAGE_ERROR, "Could not read the cart", e.into())),
        };
        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str::<Cart>(&raw) {
            Ok(cart) => Ok(Some(cart)),
            Err(e) => {
                warn!(error = %e, "Discarding corrupt local cart");
                if let Err(remove_err) = self.store.remove(keys::CART) {
                    warn!(error = %remove_err, "Could not remove corrupt local cart");
                }
                Err(self.fail(
                    notice::LOCAL_CART_CORRUPT,
                    "Saved cart was unreadable and has been reset",
                    StorefrontError::Deserialization(e),
                ))
            }
        }
    }

    /// Write the anonymous cart to the local store. An empty cart removes the
    /// entry. Nothing is written outside the anonymous phase.
    fn persist(&self) -> Result<()> {
        if !self.phase.is_anonymous() {
            return Ok(());
        }

        let written = if self.cart.is_empty() {
            self.store.remove(keys::CART).map_err(StorefrontError::from)
        } else {
            serde_json::to_string(&self.cart)
                .map_err(StorefrontError::Serialization)
                .and_then(|json| {
                    self.store
                        .set(keys::CART, &json)
                        .map_err(StorefrontError::from)
                })
        };

        written.map_err(|e| self.fail(notice::STORAGE_ERROR, "Could not save the cart", e))
    }

    fn remote_token(&self) -> Option<SecretString> {
        self.phase.token().map(copy_token)
    }

    fn notify(&self, notice: Notice) {
        self.notifier.notify(notice);
    }

    /// Log, report and notify a failure, handing the error back.
    fn fail(&self, key: &'static str, context: &str, err: StorefrontError) -> StorefrontError {
        err.report();
        self.notify(Notice::error(key, format!("{context}: {err}")));
        err
    }
}

impl<A> fmt::Debug for CartManager<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartManager")
            .field("phase", &self.phase)
            .field("cart", &self.cart)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::api::ApiError;
    use crate::notify::NoticeLog;
    use crate::storage::MemoryStore;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Fetch,
        Add(i32, u32),
        Update(i32, u32),
        Remove(i32),
        Clear,
    }

    #[derive(Default)]
    struct FakeState {
        catalog: HashMap<ProductId, Product>,
        remote: Cart,
        calls: Vec<Call>,
        fail_on: Option<&'static str>,
    }

    /// In-memory server cart.
    #[derive(Clone, Default)]
    struct FakeCartApi {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeCartApi {
        fn with_catalog(products: &[Product]) -> Self {
            let api = Self::default();
            api.state.lock().unwrap().catalog =
                products.iter().map(|p| (p.id, p.clone())).collect();
            api
        }

        fn seed_remote(&self, product: &Product, quantity: u32) {
            self.state
                .lock()
                .unwrap()
                .remote
                .add(product.clone(), qty(quantity));
        }

        fn fail_on(&self, op: &'static str) {
            self.state.lock().unwrap().fail_on = Some(op);
        }

        fn calls(&self) -> Vec<Call> {
            self.state.lock().unwrap().calls.clone()
        }

        fn remote_quantity(&self, id: i32) -> Option<u32> {
            self.state
                .lock()
                .unwrap()
                .remote
                .get(ProductId::new(id))
                .map(|i| i.quantity.get())
        }

        fn record(&self, op: &'static str, call: Call) -> std::result::Result<(), ApiError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            if state.fail_on == Some(op) {
                return Err(ApiError::Status {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    impl CartApi for FakeCartApi {
        async fn fetch_cart(&self, _token: &SecretString) -> std::result::Result<Cart, ApiError> {
            self.record("fetch", Call::Fetch)?;
            Ok(self.state.lock().unwrap().remote.clone())
        }

        async fn add_item(
            &self,
            _token: &SecretString,
            product_id: ProductId,
            quantity: Quantity,
        ) -> std::result::Result<(), ApiError> {
            self.record("add", Call::Add(product_id.as_i32(), quantity.get()))?;
            let mut state = self.state.lock().unwrap();
            let product = state.catalog[&product_id].clone();
            state.remote.add(product, quantity);
            Ok(())
        }

        async fn update_item(
            &self,
            _token: &SecretString,
            product_id: ProductId,
            quantity: Quantity,
        ) -> std::result::Result<(), ApiError> {
            self.record("update", Call::Update(product_id.as_i32(), quantity.get()))?;
            self.state
                .lock()
                .unwrap()
                .remote
                .set_quantity(product_id, quantity);
            Ok(())
        }

        async fn remove_item(
            &self,
            _token: &SecretString,
            product_id: ProductId,
        ) -> std::result::Result<(), ApiError> {
            self.record("remove", Call::Remove(product_id.as_i32()))?;
            let mut state = self.state.lock().unwrap();
            if !state.remote.contains(product_id) {
                return Err(ApiError::Status {
                    status: 404,
                    message: "not in cart".to_string(),
                });
            }
            state.remote.remove(product_id);
            Ok(())
        }

        async fn clear_cart(&self, _token: &SecretString) -> std::result::Result<(), ApiError> {
            self.record("clear", Call::Clear)?;
            self.state.lock().unwrap().remote.clear();
            Ok(())
        }
    }

    fn product(id: i32, price: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Producto {id}"),
            description: None,
            price: price.parse().unwrap(),
            stock: 50,
            images: Vec::new(),
            category_id: None,
        }
    }

    fn qty(n: u32) -> Quantity {
        Quantity::new(i64::from(n)).unwrap()
    }

    fn token() -> SecretString {
        SecretString::from("tok-abc".to_string())
    }

    struct Harness {
        manager: CartManager<FakeCartApi>,
        api: FakeCartApi,
        store: MemoryStore,
        notices: NoticeLog,
    }

    fn harness(catalog: &[Product]) -> Harness {
        let api = FakeCartApi::with_catalog(catalog);
        let store = MemoryStore::new();
        let notices = NoticeLog::new();
        let manager = CartManager::new(
            api.clone(),
            Arc::new(store.clone()),
            Arc::new(notices.clone()),
        );
        Harness {
            manager,
            api,
            store,
            notices,
        }
    }

    fn quantities(cart: &Cart) -> Vec<(i32, u32)> {
        cart.items()
            .iter()
            .map(|i| (i.product_id.as_i32(), i.quantity.get()))
            .collect()
    }

    fn stored_quantities(store: &MemoryStore) -> Option<Vec<(i32, u32)>> {
        let raw = store.get(keys::CART).unwrap()?;
        let cart: Cart = serde_json::from_str(&raw).unwrap();
        Some(quantities(&cart))
    }

    #[tokio::test]
    async fn test_anonymous_add_sums_quantities_and_persists() {
        let a = product(1, "10.00");
        let mut h = harness(&[]);

        h.manager.add_item(a.clone(), 2).await.unwrap();
        h.manager.add_item(a, 3).await.unwrap();

        assert_eq!(quantities(h.manager.cart()), vec![(1, 5)]);
        assert_eq!(stored_quantities(&h.store), Some(vec![(1, 5)]));
        assert_eq!(h.manager.subtotal().to_string(), "$50.00");
        assert_eq!(
            h.notices.keys(),
            vec![notice::ADD_SUCCESS, notice::ADD_SUCCESS]
        );
        assert!(h.api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_quantity_never_mutates() {
        let a = product(1, "10.00");
        let mut h = harness(&[a.clone()]);
        h.manager.add_item(a.clone(), 2).await.unwrap();
        h.notices.drain();

        for bad in [0, -3] {
            let err = h.manager.update_quantity(a.id, bad).await.unwrap_err();
            assert!(err.is_validation());
            let err = h.manager.add_item(a.clone(), bad).await.unwrap_err();
            assert!(err.is_validation());
        }

        assert_eq!(quantities(h.manager.cart()), vec![(1, 2)]);
        assert!(h.notices.keys().iter().all(|k| *k == notice::INVALID_QUANTITY));
        assert_eq!(h.notices.keys().len(), 4);

        // Same when signed in: no request goes out
        h.manager.sign_in(token()).await.unwrap();
        let calls_before = h.api.calls().len();
        assert!(h.manager.update_quantity(a.id, 0).await.unwrap_err().is_validation());
        assert_eq!(h.api.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_local_cart_round_trip() {
        let mut h = harness(&[]);
        h.manager.add_item(product(1, "12.50"), 1).await.unwrap();
        h.manager.add_item(product(2, "3"), 4).await.unwrap();
        h.manager.update_quantity(ProductId::new(1), 2).await.unwrap();

        let mut reloaded = CartManager::new(
            FakeCartApi::default(),
            Arc::new(h.store.clone()),
            Arc::new(NoticeLog::new()),
        );
        reloaded.reload_local().unwrap();

        assert_eq!(reloaded.cart(), h.manager.cart());
        assert_eq!(reloaded.subtotal().to_string(), "$37.00");
    }

    #[tokio::test]
    async fn test_anonymous_update_of_missing_product_is_noop() {
        let mut h = harness(&[]);
        h.manager.update_quantity(ProductId::new(9), 3).await.unwrap();
        assert!(h.manager.cart().is_empty());
        assert!(!h.store.contains(keys::CART));
        assert!(h.notices.keys().is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_product_is_noop_in_both_modes() {
        let a = product(1, "1");
        let mut h = harness(&[a.clone()]);
        h.manager.add_item(a.clone(), 1).await.unwrap();
        h.notices.drain();

        h.manager.remove_item(ProductId::new(42)).await.unwrap();
        assert_eq!(quantities(h.manager.cart()), vec![(1, 1)]);
        assert!(h.notices.keys().is_empty());

        h.manager.sign_in(token()).await.unwrap();
        let calls_before = h.api.calls();
        h.notices.drain();

        h.manager.remove_item(ProductId::new(42)).await.unwrap();
        assert_eq!(h.api.calls()[calls_before.len()..], [Call::Remove(42), Call::Fetch]);
        assert_eq!(quantities(h.manager.cart()), vec![(1, 1)]);
        assert!(h.notices.keys().is_empty());
    }

    #[tokio::test]
    async fn test_signed_in_remove_reaches_lines_added_elsewhere() {
        let a = product(1, "1");
        let b = product(2, "1");
        let mut h = harness(&[a.clone(), b.clone()]);
        h.api.seed_remote(&a, 1);
        h.manager.sign_in(token()).await.unwrap();

        // Added on the server after the last fetch
        h.api.seed_remote(&b, 3);
        assert!(!h.manager.cart().contains(b.id));

        h.manager.remove_item(b.id).await.unwrap();

        assert_eq!(h.api.remote_quantity(2), None);
        assert_eq!(h.api.calls().last(), Some(&Call::Fetch));
        assert!(h.api.calls().contains(&Call::Remove(2)));
        assert_eq!(quantities(h.manager.cart()), vec![(1, 1)]);
        assert_eq!(h.notices.keys().last(), Some(&notice::REMOVE_SUCCESS));
    }

    #[tokio::test]
    async fn test_remove_and_clear_when_anonymous() {
        let mut h = harness(&[]);
        h.manager.add_item(product(1, "1"), 1).await.unwrap();
        h.manager.add_item(product(2, "1"), 1).await.unwrap();

        h.manager.remove_item(ProductId::new(1)).await.unwrap();
        assert_eq!(stored_quantities(&h.store), Some(vec![(2, 1)]));

        h.manager.remove_item(ProductId::new(2)).await.unwrap();
        assert!(!h.store.contains(keys::CART));

        h.manager.add_item(product(3, "1"), 1).await.unwrap();
        h.manager.clear().await.unwrap();
        assert!(h.manager.cart().is_empty());
        assert!(!h.store.contains(keys::CART));
        assert_eq!(h.notices.keys().last(), Some(&notice::CLEAR_SUCCESS));
    }

    #[tokio::test]
    async fn test_sign_in_merges_shared_products() {
        let a = product(1, "10");
        let b = product(2, "5");
        let mut h = harness(&[a.clone(), b.clone()]);
        h.api.seed_remote(&a, 3);
        h.api.seed_remote(&b, 1);

        h.manager.add_item(a, 2).await.unwrap();
        h.manager.sign_in(token()).await.unwrap();

        assert_eq!(h.api.remote_quantity(1), Some(5));
        assert_eq!(h.api.remote_quantity(2), Some(1));
        assert_eq!(quantities(h.manager.cart()), vec![(1, 5), (2, 1)]);
        assert!(!h.store.contains(keys::CART));
        assert!(h.manager.phase().is_authenticated());
        assert_eq!(h.notices.keys().last(), Some(&notice::SYNC_SUCCESS));
    }

    #[tokio::test]
    async fn test_sign_in_scenario_adds_and_updates_in_local_order() {
        let a = product(1, "10");
        let b = product(2, "5");
        let mut h = harness(&[a.clone(), b.clone()]);

        h.manager.add_item(a.clone(), 1).await.unwrap();
        h.manager.add_item(b, 2).await.unwrap();
        assert_eq!(stored_quantities(&h.store), Some(vec![(1, 1), (2, 2)]));

        h.api.seed_remote(&a, 1);
        h.manager.sign_in(token()).await.unwrap();

        assert_eq!(
            h.api.calls(),
            vec![Call::Fetch, Call::Update(1, 2), Call::Add(2, 2), Call::Fetch]
        );
        assert_eq!(quantities(h.manager.cart()), vec![(1, 2), (2, 2)]);
        assert!(!h.store.contains(keys::CART));
    }

    #[tokio::test]
    async fn test_sign_in_without_local_cart_just_fetches() {
        let a = product(1, "10");
        let mut h = harness(&[a.clone()]);
        h.api.seed_remote(&a, 4);

        h.manager.sign_in(token()).await.unwrap();

        assert_eq!(h.api.calls(), vec![Call::Fetch]);
        assert_eq!(quantities(h.manager.cart()), vec![(1, 4)]);
        assert!(h.notices.keys().is_empty());
    }

    #[tokio::test]
    async fn test_reconciliation_runs_once() {
        let a = product(1, "10");
        let mut h = harness(&[a.clone()]);
        h.manager.add_item(a, 1).await.unwrap();

        h.manager.sign_in(token()).await.unwrap();
        let calls = h.api.calls();

        h.manager.sign_in(token()).await.unwrap();
        assert_eq!(h.api.calls(), calls);
    }

    #[tokio::test]
    async fn test_failed_reconciliation_keeps_local_copy() {
        let a = product(1, "10");
        let mut h = harness(&[a.clone()]);
        h.manager.add_item(a, 2).await.unwrap();
        h.api.fail_on("add");

        let err = h.manager.sign_in(token()).await.unwrap_err();

        assert!(matches!(err, StorefrontError::Network(_)));
        assert!(h.manager.phase().is_authenticated());
        assert_eq!(stored_quantities(&h.store), Some(vec![(1, 2)]));
        assert_eq!(h.notices.keys().last(), Some(&notice::SYNC_ERROR));
    }

    #[tokio::test]
    async fn test_corrupt_local_cart_is_discarded() {
        let mut h = harness(&[]);
        h.store.set(keys::CART, "{not json").unwrap();

        let err = h.manager.reload_local().unwrap_err();

        assert!(matches!(err, StorefrontError::Deserialization(_)));
        assert!(h.manager.cart().is_empty());
        assert!(!h.store.contains(keys::CART));
        assert_eq!(h.notices.keys(), vec![notice::LOCAL_CART_CORRUPT]);
    }

    #[tokio::test]
    async fn test_authenticated_mutations_refetch() {
        let a = product(1, "10");
        let b = product(2, "5");
        let mut h = harness(&[a.clone(), b.clone()]);
        h.manager.sign_in(token()).await.unwrap();

        h.manager.add_item(a.clone(), 2).await.unwrap();
        h.manager.add_item(b.clone(), 1).await.unwrap();
        h.manager.update_quantity(a.id, 7).await.unwrap();
        h.manager.remove_item(b.id).await.unwrap();

        assert_eq!(
            h.api.calls(),
            vec![
                Call::Fetch,
                Call::Add(1, 2),
                Call::Fetch,
                Call::Add(2, 1),
                Call::Fetch,
                Call::Update(1, 7),
                Call::Fetch,
                Call::Remove(2),
                Call::Fetch,
            ]
        );
        assert_eq!(quantities(h.manager.cart()), vec![(1, 7)]);
        assert!(!h.store.contains(keys::CART));

        h.manager.clear().await.unwrap();
        assert!(h.manager.cart().is_empty());
        assert_eq!(h.api.calls().last(), Some(&Call::Clear));
    }

    #[tokio::test]
    async fn test_remote_failure_leaves_cart_unchanged() {
        let a = product(1, "10");
        let mut h = harness(&[a.clone()]);
        h.api.seed_remote(&a, 1);
        h.manager.sign_in(token()).await.unwrap();

        h.api.fail_on("update");
        let err = h.manager.update_quantity(a.id, 9).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Network(_)));
        assert_eq!(quantities(h.manager.cart()), vec![(1, 1)]);
        assert_eq!(h.notices.keys().last(), Some(&notice::UPDATE_ERROR));

        h.api.fail_on("clear");
        assert!(h.manager.clear().await.is_err());
        assert_eq!(quantities(h.manager.cart()), vec![(1, 1)]);
        assert_eq!(h.notices.keys().last(), Some(&notice::CLEAR_ERROR));
    }

    #[tokio::test]
    async fn test_sign_out_empties_without_persisting() {
        let a = product(1, "10");
        let mut h = harness(&[a.clone()]);
        h.api.seed_remote(&a, 3);
        h.manager.sign_in(token()).await.unwrap();

        h.manager.sign_out();

        assert!(h.manager.phase().is_anonymous());
        assert!(h.manager.cart().is_empty());
        assert!(!h.store.contains(keys::CART));

        h.manager.reload_local().unwrap();
        assert!(h.manager.cart().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_remote_cart_is_noop_when_anonymous() {
        let mut h = harness(&[]);
        h.manager.fetch_remote_cart().await.unwrap();
        assert!(h.api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reload_local_ignored_when_signed_in() {
        let a = product(1, "10");
        let mut h = harness(&[a.clone()]);
        h.api.seed_remote(&a, 2);
        h.manager.sign_in(token()).await.unwrap();

        h.store
            .set(keys::CART, &serde_json::to_string(&Cart::new()).unwrap())
            .unwrap();
        h.manager.reload_local().unwrap();

        assert_eq!(quantities(h.manager.cart()), vec![(1, 2)]);
    }
}
