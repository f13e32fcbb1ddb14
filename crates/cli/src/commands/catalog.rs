//! Catalog browsing commands.

use tienda_core::{CategoryId, ProductId};
use tienda_storefront::Storefront;
use tienda_storefront::api::ProductFilter;
use tienda_storefront::error::StorefrontError;

use super::CliError;
use crate::output;

pub async fn list(
    storefront: &Storefront,
    search: Option<&str>,
    category: Option<CategoryId>,
) -> Result<(), CliError> {
    let mut filter = search.map(ProductFilter::search).unwrap_or_default();
    if let Some(category) = category {
        filter = filter.in_category(category);
    }

    let products = storefront
        .api()
        .products(&filter)
        .await
        .map_err(StorefrontError::from)?;
    output::products(&products);
    Ok(())
}

pub async fn show(storefront: &Storefront, id: ProductId) -> Result<(), CliError> {
    let product = storefront
        .api()
        .product(id)
        .await
        .map_err(StorefrontError::from)?;
    output::product(&product);
    Ok(())
}

pub async fn featured(storefront: &Storefront) -> Result<(), CliError> {
    let products = storefront
        .api()
        .featured_products()
        .await
        .map_err(StorefrontError::from)?;
    output::products(&products);
    Ok(())
}

pub async fn related(storefront: &Storefront, id: ProductId) -> Result<(), CliError> {
    let api = storefront.api();
    let product = api.product(id).await.map_err(StorefrontError::from)?;
    let related = api
        .related_products(&product)
        .await
        .map_err(StorefrontError::from)?;
    output::products(&related);
    Ok(())
}

pub async fn categories(storefront: &Storefront) -> Result<(), CliError> {
    let categories = storefront
        .api()
        .categories()
        .await
        .map_err(StorefrontError::from)?;
    output::categories(&categories);
    Ok(())
}
