//! Checkout and order history.

use reqwest::Method;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tienda_core::{Order, PaymentMethod};

use super::{ApiClient, ApiError};

/// Body of `POST /pedidos/checkout`.
///
/// The backend builds the order from the customer's server cart, so only
/// delivery and payment details are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    #[serde(rename = "direccionEnvio")]
    pub shipping_address: String,
    #[serde(rename = "metodoPago")]
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    order: Order,
}

impl ApiClient {
    /// Place an order for the contents of the server cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token, request), fields(payment_method = %request.payment_method))]
    pub async fn checkout(
        &self,
        token: &SecretString,
        request: &CheckoutRequest,
    ) -> Result<Order, ApiError> {
        let url = self.endpoint("pedidos/checkout")?;
        let response: CheckoutResponse = self
            .send_json(self.request(Method::POST, url, Some(token)).json(request))
            .await?;
        Ok(response.order)
    }

    /// List the customer's orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn orders(&self, token: &SecretString) -> Result<Vec<Order>, ApiError> {
        let url = self.endpoint("pedidos")?;
        self.send_json(self.request(Method::GET, url, Some(token)))
            .await
    }
}
