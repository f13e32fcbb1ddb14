//! Core types for Tienda.
//!
//! This module provides type-safe wrappers for common domain concepts and the
//! JSON shapes the storefront backend speaks. Field names on the wire are
//! Spanish (`nombre`, `precio`, `cantidad`); Rust names are English.

pub mod email;
pub mod id;
pub mod order;
pub mod price;
pub mod product;
pub mod profile;
pub mod quantity;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use order::{Order, OrderLine};
pub use price::{Price, PriceError};
pub use product::{Category, Product, StockLevel};
pub use profile::UserProfile;
pub use quantity::{Quantity, QuantityError};
pub use status::{OrderStatus, PaymentMethod};
