//! Catalog endpoints: products and categories.
//!
//! Catalog reads are public and change rarely, so responses are cached for
//! the configured TTL (5 minutes by default). Free-text searches are not
//! cached.

use reqwest::Method;
use tracing::{debug, instrument};

use tienda_core::{Category, CategoryId, Product, ProductId};

use super::{ApiClient, ApiError};

/// Number of related products shown next to a product.
pub const RELATED_PRODUCTS_LIMIT: u32 = 4;

/// Cache key for catalog responses.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Products { category: Option<CategoryId> },
    Featured,
    Product(ProductId),
    Categories,
    Related {
        category: CategoryId,
        exclude: ProductId,
        limit: u32,
    },
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Products(Vec<Product>),
    Product(Box<Product>),
    Categories(Vec<Category>),
}

/// Filters for `GET /products`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Free-text search (`search`).
    pub search: Option<String>,
    /// Restrict to one category (`categoria`).
    pub category: Option<CategoryId>,
}

impl ProductFilter {
    /// Filter by search text; blank text means no filter.
    #[must_use]
    pub fn search(text: &str) -> Self {
        let text = text.trim();
        Self {
            search: (!text.is_empty()).then(|| text.to_string()),
            category: None,
        }
    }

    #[must_use]
    pub const fn in_category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }
}

impl ApiClient {
    /// List products, optionally filtered.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, filter), fields(search = ?filter.search, category = ?filter.category))]
    pub async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>, ApiError> {
        let cache_key = filter.search.is_none().then_some(CacheKey::Products {
            category: filter.category,
        });

        if let Some(key) = &cache_key
            && let Some(CacheValue::Products(products)) = self.cache().get(key).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let mut url = self.endpoint("products")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(search) = &filter.search {
                query.append_pair("search", search);
            }
            if let Some(category) = filter.category {
                query.append_pair("categoria", &category.to_string());
            }
        }
        strip_empty_query(&mut url);

        let products: Vec<Product> = self.send_json(self.request(Method::GET, url, None)).await?;

        if let Some(key) = cache_key {
            self.cache()
                .insert(key, CacheValue::Products(products.clone()))
                .await;
        }

        Ok(products)
    }

    /// List featured products (`GET /products?featured=true`).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn featured_products(&self) -> Result<Vec<Product>, ApiError> {
        if let Some(CacheValue::Products(products)) = self.cache().get(&CacheKey::Featured).await {
            debug!("Cache hit for featured products");
            return Ok(products);
        }

        let mut url = self.endpoint("products")?;
        url.query_pairs_mut().append_pair("featured", "true");

        let products: Vec<Product> = self.send_json(self.request(Method::GET, url, None)).await?;
        self.cache()
            .insert(CacheKey::Featured, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    /// Get a single product.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: ProductId) -> Result<Product, ApiError> {
        let cache_key = CacheKey::Product(id);

        if let Some(CacheValue::Product(product)) = self.cache().get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let url = self.endpoint(&format!("products/{id}"))?;
        let product: Product = self.send_json(self.request(Method::GET, url, None)).await?;

        self.cache()
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// List every category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        if let Some(CacheValue::Categories(categories)) =
            self.cache().get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let url = self.endpoint("categories")?;
        let categories: Vec<Category> = self.send_json(self.request(Method::GET, url, None)).await?;

        self.cache()
            .insert(CacheKey::Categories, CacheValue::Categories(categories.clone()))
            .await;

        Ok(categories)
    }

    /// Products from the same category as `product`, excluding it.
    ///
    /// A product without a category has no related products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn related_products(&self, product: &Product) -> Result<Vec<Product>, ApiError> {
        let Some(category) = product.category_id else {
            return Ok(Vec::new());
        };

        let cache_key = CacheKey::Related {
            category,
            exclude: product.id,
            limit: RELATED_PRODUCTS_LIMIT,
        };

        if let Some(CacheValue::Products(products)) = self.cache().get(&cache_key).await {
            debug!("Cache hit for related products");
            return Ok(products);
        }

        let mut url = self.endpoint(&format!("categories/{category}/products"))?;
        url.query_pairs_mut()
            .append_pair("limit", &RELATED_PRODUCTS_LIMIT.to_string())
            .append_pair("exclude", &product.id.to_string());

        let products: Vec<Product> = self.send_json(self.request(Method::GET, url, None)).await?;
        self.cache()
            .insert(cache_key, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }
}

/// `query_pairs_mut` leaves a bare `?` behind when nothing was appended.
fn strip_empty_query(url: &mut url::Url) {
    if url.query() == Some("") {
        url.set_query(None);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_search_filter_ignores_blank_text() {
        assert_eq!(ProductFilter::search("   "), ProductFilter::default());
        assert_eq!(
            ProductFilter::search(" taza ").search.as_deref(),
            Some("taza")
        );
    }

    #[test]
    fn test_filter_with_category() {
        let filter = ProductFilter::default().in_category(CategoryId::new(3));
        assert_eq!(filter.category, Some(CategoryId::new(3)));
        assert!(filter.search.is_none());
    }

    #[test]
    fn test_strip_empty_query() {
        let mut url = url::Url::parse("http://localhost/api/products").unwrap();
        let _ = url.query_pairs_mut();
        strip_empty_query(&mut url);
        assert_eq!(url.as_str(), "http://localhost/api/products");
    }
}
