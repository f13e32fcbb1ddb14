//! Server cart endpoints.

use std::future::Future;

use reqwest::Method;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tienda_core::{Cart, CartItem, Product, ProductId, Quantity};

use super::{ApiClient, ApiError};

/// Operations on the signed-in customer's server cart.
///
/// The cart manager only talks to the backend through this trait so its
/// state machine can be exercised against an in-memory fake.
pub trait CartApi: Send + Sync {
    /// `GET /carts`
    fn fetch_cart(
        &self,
        token: &SecretString,
    ) -> impl Future<Output = Result<Cart, ApiError>> + Send;

    /// `POST /carts/add`
    fn add_item(
        &self,
        token: &SecretString,
        product_id: ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `PUT /carts/update`
    fn update_item(
        &self,
        token: &SecretString,
        product_id: ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `DELETE /carts/remove/{product_id}`
    fn remove_item(
        &self,
        token: &SecretString,
        product_id: ProductId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `POST /carts/clear`
    fn clear_cart(&self, token: &SecretString) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Body of `GET /carts`.
///
/// A customer who never added anything gets `{}` back, hence the default.
#[derive(Debug, Deserialize)]
pub struct RemoteCart {
    #[serde(rename = "cartItems", default)]
    pub items: Vec<RemoteCartItem>,
}

/// One server cart line. Prices and quantities may arrive as strings; the
/// core types coerce them on the way in.
#[derive(Debug, Deserialize)]
pub struct RemoteCartItem {
    /// `null` when the product was deleted after it was added.
    pub product: Option<Product>,
    #[serde(rename = "cantidad")]
    pub quantity: Quantity,
}

impl From<RemoteCart> for Cart {
    fn from(remote: RemoteCart) -> Self {
        Self::from_items(remote.items.into_iter().filter_map(|item| {
            let Some(product) = item.product else {
                tracing::warn!("Skipping server cart line without a product");
                return None;
            };
            Some(CartItem::new(product, item.quantity))
        }))
    }
}

/// Body of the add and update requests.
#[derive(Debug, Serialize)]
struct CartLineRequest {
    #[serde(rename = "productoId")]
    product_id: ProductId,
    #[serde(rename = "cantidad")]
    quantity: Quantity,
}

impl CartApi for ApiClient {
    #[instrument(skip_all)]
    async fn fetch_cart(&self, token: &SecretString) -> Result<Cart, ApiError> {
        let url = self.endpoint("carts")?;
        let remote: RemoteCart = self
            .send_json(self.request(Method::GET, url, Some(token)))
            .await?;
        Ok(remote.into())
    }

    #[instrument(skip(self, token), fields(product_id = %product_id, quantity = %quantity))]
    async fn add_item(
        &self,
        token: &SecretString,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), ApiError> {
        let url = self.endpoint("carts/add")?;
        let body = CartLineRequest {
            product_id,
            quantity,
        };
        self.send_unit(self.request(Method::POST, url, Some(token)).json(&body))
            .await
    }

    #[instrument(skip(self, token), fields(product_id = %product_id, quantity = %quantity))]
    async fn update_item(
        &self,
        token: &SecretString,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), ApiError> {
        let url = self.endpoint("carts/update")?;
        let body = CartLineRequest {
            product_id,
            quantity,
        };
        self.send_unit(self.request(Method::PUT, url, Some(token)).json(&body))
            .await
    }

    #[instrument(skip(self, token), fields(product_id = %product_id))]
    async fn remove_item(&self, token: &SecretString, product_id: ProductId) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("carts/remove/{product_id}"))?;
        self.send_unit(self.request(Method::DELETE, url, Some(token)))
            .await
    }

    #[instrument(skip_all)]
    async fn clear_cart(&self, token: &SecretString) -> Result<(), ApiError> {
        let url = self.endpoint("carts/clear")?;
        self.send_unit(self.request(Method::POST, url, Some(token)))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_cart_coerces_string_fields() {
        let remote: RemoteCart = serde_json::from_value(serde_json::json!({
            "cartItems": [
                {
                    "product": { "id": 1, "nombre": "Taza", "precio": "12.50", "cantidadEnStock": 4 },
                    "cantidad": "2"
                },
                {
                    "product": { "id": 2, "nombre": "Plato", "precio": 3 },
                    "cantidad": 1
                }
            ]
        }))
        .unwrap();

        let cart = Cart::from(remote);
        assert_eq!(cart.len(), 2);
        let first = cart.get(ProductId::new(1)).unwrap();
        assert_eq!(first.quantity.get(), 2);
        assert_eq!(first.product.price.to_string(), "$12.50");
        assert_eq!(cart.subtotal().to_string(), "$28.00");
    }

    #[test]
    fn test_remote_cart_missing_items_is_empty() {
        let remote: RemoteCart = serde_json::from_str("{}").unwrap();
        assert!(Cart::from(remote).is_empty());
    }

    #[test]
    fn test_remote_cart_skips_deleted_products() {
        let remote: RemoteCart = serde_json::from_value(serde_json::json!({
            "cartItems": [
                { "product": null, "cantidad": 1 },
                { "product": { "id": 5, "nombre": "Vaso", "precio": 2 }, "cantidad": 3 }
            ]
        }))
        .unwrap();

        let cart = Cart::from(remote);
        assert_eq!(cart.len(), 1);
        assert!(cart.contains(ProductId::new(5)));
    }

    #[test]
    fn test_line_request_wire_names() {
        let body = CartLineRequest {
            product_id: ProductId::new(9),
            quantity: Quantity::new(4).unwrap(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "productoId": 9, "cantidad": 4 })
        );
    }
}
