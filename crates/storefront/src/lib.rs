//! Tienda storefront client library.
//!
//! Talks to the Tienda backend REST API and keeps the customer's cart in
//! sync with it. A visitor can fill a cart without an account; the cart is
//! kept in the local store and merged into the server cart on login.
//!
//! Start with [`state::Storefront`], which owns the API client, the session
//! and the [`cart::CartManager`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod error;
pub mod notify;
pub mod session;
pub mod state;
pub mod storage;

pub use api::{ApiClient, ApiError, CartApi};
pub use cart::{CartManager, CartPhase};
pub use config::StorefrontConfig;
pub use error::{StorefrontError, ValidationError};
pub use notify::{Notice, NoticeLevel, NoticeLog, Notifier, TracingNotifier};
pub use state::Storefront;
pub use storage::{FileStore, LocalStore, MemoryStore};
