//! Catalog models: products and categories.

use serde::{Deserialize, Serialize};

use super::id::{CategoryId, ProductId};
use super::price::Price;

/// Stock at or below this count is shown as "low stock".
pub const LOW_STOCK_THRESHOLD: u32 = 20;

/// A product as returned by the catalog endpoints.
///
/// Cart lines hold a snapshot of this struct taken when the product was
/// added, so the price and stock shown in the cart may lag the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "precio")]
    pub price: Price,
    /// Units in stock (`cantidadEnStock`).
    #[serde(rename = "cantidadEnStock", default)]
    pub stock: u32,
    /// Image paths relative to the backend host.
    #[serde(rename = "imagenes", default)]
    pub images: Vec<String>,
    #[serde(rename = "categoriaId", default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
}

/// Coarse stock availability for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockLevel {
    InStock,
    Low(u32),
    OutOfStock,
}

impl Product {
    /// Classify the product's stock.
    #[must_use]
    pub const fn stock_level(&self) -> StockLevel {
        match self.stock {
            0 => StockLevel::OutOfStock,
            n if n <= LOW_STOCK_THRESHOLD => StockLevel::Low(n),
            _ => StockLevel::InStock,
        }
    }

    /// The first image, used as the thumbnail.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Image file name under `uploads/categories/`.
    #[serde(rename = "imagen", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}
