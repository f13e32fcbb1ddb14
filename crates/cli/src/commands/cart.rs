//! Cart commands.
//!
//! Anonymous visitors work on the cart in the local store; signed-in
//! customers work on their server cart.

use tienda_core::ProductId;
use tienda_storefront::Storefront;
use tienda_storefront::error::StorefrontError;

use super::CliError;
use crate::output;

pub async fn show(storefront: &mut Storefront) -> Result<(), CliError> {
    storefront.start().await?;
    output::cart(storefront.cart());
    Ok(())
}

pub async fn add(
    storefront: &mut Storefront,
    product_id: ProductId,
    quantity: i64,
) -> Result<(), CliError> {
    storefront.start().await?;
    let product = storefront
        .api()
        .product(product_id)
        .await
        .map_err(StorefrontError::from)?;

    storefront.add_to_cart(product, quantity).await?;
    warn_over_stock(storefront, product_id);
    output::cart(storefront.cart());
    Ok(())
}

pub async fn update(
    storefront: &mut Storefront,
    product_id: ProductId,
    quantity: i64,
) -> Result<(), CliError> {
    storefront.start().await?;
    storefront.update_cart_item(product_id, quantity).await?;
    warn_over_stock(storefront, product_id);
    output::cart(storefront.cart());
    Ok(())
}

pub async fn remove(storefront: &mut Storefront, product_id: ProductId) -> Result<(), CliError> {
    storefront.start().await?;
    storefront.remove_from_cart(product_id).await?;
    output::cart(storefront.cart());
    Ok(())
}

pub async fn clear(storefront: &mut Storefront) -> Result<(), CliError> {
    storefront.start().await?;
    storefront.clear_cart().await?;
    output::cart(storefront.cart());
    Ok(())
}

pub async fn sync(storefront: &mut Storefront) -> Result<(), CliError> {
    super::account::require_session(storefront).await?;
    storefront.refresh_cart().await?;
    output::cart(storefront.cart());
    Ok(())
}

/// Stock is not enforced by the cart; only point it out.
fn warn_over_stock(storefront: &Storefront, product_id: ProductId) {
    if let Some(item) = storefront.cart().cart().get(product_id)
        && item.exceeds_stock()
    {
        output::warning(&format!(
            "only {} of {} in stock",
            item.product.stock, item.product.name
        ));
    }
}
