//! The shopping cart collection and the anonymous-to-remote merge plan.
//!
//! [`Cart`] is an ordered list of [`CartItem`]s keyed by product: adding a
//! product that is already present increments its quantity instead of adding
//! a second line. The cart never performs I/O; the storefront crate decides
//! whether a mutation is applied here directly (anonymous visitor) or sent to
//! the backend and re-read (signed-in customer).

use serde::{Deserialize, Serialize};

use crate::types::{Price, Product, ProductId, Quantity};

/// One cart line.
///
/// Serialized as `{ "id": .., "product": {..}, "cantidad": .. }`, the shape
/// kept in the local cart entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(rename = "id")]
    pub product_id: ProductId,
    /// Product attributes captured when the line was created.
    pub product: Product,
    #[serde(rename = "cantidad")]
    pub quantity: Quantity,
}

impl CartItem {
    /// Create a line from a product snapshot.
    #[must_use]
    pub fn new(product: Product, quantity: Quantity) -> Self {
        Self {
            product_id: product.id,
            product,
            quantity,
        }
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.quantity)
    }

    /// Whether the requested quantity exceeds the stock known at snapshot time.
    #[must_use]
    pub const fn exceeds_stock(&self) -> bool {
        self.quantity.get() > self.product.stock
    }
}

/// An ordered collection of cart lines, at most one per product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CartItem>", into = "Vec<CartItem>")]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from lines, folding duplicate products together.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut cart = Self::new();
        for item in items {
            cart.add(item.product, item.quantity);
        }
        cart
    }

    /// The lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.get(product_id).is_some()
    }

    /// Add units of a product.
    ///
    /// An existing line keeps its snapshot and gains `quantity` units; a new
    /// product is appended with a fresh snapshot.
    pub fn add(&mut self, product: Product, quantity: Quantity) {
        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product.id) {
            item.quantity = item.quantity.saturating_add(quantity);
        } else {
            self.items.push(CartItem::new(product, quantity));
        }
    }

    /// Replace a line's quantity. Returns `false` if the product is absent.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: Quantity) -> bool {
        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Drop a line. Returns `false` if the product is absent.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn total_units(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity.get())).sum()
    }
}

impl From<Vec<CartItem>> for Cart {
    fn from(items: Vec<CartItem>) -> Self {
        Self::from_items(items)
    }
}

impl From<Cart> for Vec<CartItem> {
    fn from(cart: Cart) -> Self {
        cart.items
    }
}

impl<'a> IntoIterator for &'a Cart {
    type Item = &'a CartItem;
    type IntoIter = core::slice::Iter<'a, CartItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// One remote request needed to fold a local cart into the server cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStep {
    /// The product is already in the server cart: set the combined quantity.
    Update {
        product_id: ProductId,
        quantity: Quantity,
    },
    /// The product is new to the server cart: add the local quantity.
    Add {
        product_id: ProductId,
        quantity: Quantity,
    },
}

impl MergeStep {
    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        match self {
            Self::Update { product_id, .. } | Self::Add { product_id, .. } => *product_id,
        }
    }
}

/// Plan the requests that merge `local` into `remote`.
///
/// Steps follow the local cart's order so that applying them one after the
/// other is deterministic. Quantities for products present on both sides are
/// summed.
///
/// ```
/// use tienda_core::{Cart, MergeStep, Product, ProductId, Quantity, plan_merge};
///
/// # fn product(id: i32) -> Product {
/// #     serde_json::from_value(serde_json::json!({"id": id, "nombre": "p", "precio": 1})).unwrap()
/// # }
/// let mut local = Cart::new();
/// local.add(product(1), Quantity::new(2).unwrap());
/// let mut remote = Cart::new();
/// remote.add(product(1), Quantity::new(3).unwrap());
///
/// assert_eq!(
///     plan_merge(&local, &remote),
///     vec![MergeStep::Update { product_id: ProductId::new(1), quantity: Quantity::new(5).unwrap() }],
/// );
/// ```
#[must_use]
pub fn plan_merge(local: &Cart, remote: &Cart) -> Vec<MergeStep> {
    local
        .items()
        .iter()
        .map(|item| match remote.get(item.product_id) {
            Some(existing) => MergeStep::Update {
                product_id: item.product_id,
                quantity: existing.quantity.saturating_add(item.quantity),
            },
            None => MergeStep::Add {
                product_id: item.product_id,
                quantity: item.quantity,
            },
        })
        .collect()
}
