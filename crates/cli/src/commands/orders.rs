//! Checkout and order history.

use tienda_core::PaymentMethod;
use tienda_storefront::Storefront;

use super::CliError;
use super::account::require_session;
use crate::output;

pub async fn checkout(
    storefront: &mut Storefront,
    address: &str,
    payment: PaymentMethod,
) -> Result<(), CliError> {
    require_session(storefront).await?;
    let order = storefront.checkout(address, payment).await?;
    output::order(&order);
    Ok(())
}

pub async fn list(storefront: &mut Storefront) -> Result<(), CliError> {
    require_session(storefront).await?;
    let orders = storefront.orders().await?;
    if orders.is_empty() {
        output::line("No orders yet");
    }
    for order in &orders {
        output::order(order);
    }
    Ok(())
}
