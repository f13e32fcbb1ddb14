//! Tienda Core - Shared types library.
//!
//! This crate provides the domain types used across all Tienda components:
//! - `storefront` - Client library (REST API client, cart state manager)
//! - `cli` - Terminal front end for browsing, cart and checkout
//! - `integration-tests` - Mock backend and end-to-end tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no persistence. Everything that talks to the backend or to disk
//! lives in `tienda-storefront`.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, quantities, emails, statuses
//!   and the backend's product/order/profile models
//! - [`cart`] - The cart collection and the anonymous-to-remote merge plan

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{Cart, CartItem, MergeStep, plan_merge};
pub use types::*;
