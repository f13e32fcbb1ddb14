//! REST client for the Tienda backend.
//!
//! One `reqwest` client is shared by every endpoint group:
//!
//! - [`cart`] - the signed-in customer's server cart (behind [`CartApi`])
//! - [`catalog`] - products and categories, cached with `moka`
//! - [`account`] - login, registration and profile
//! - [`orders`] - checkout and order history
//!
//! Every path is joined onto the configured base URL, so
//! `http://localhost:5000/api/` + `carts/add` targets
//! `http://localhost:5000/api/carts/add`.

pub mod account;
pub mod cart;
pub mod catalog;
pub mod orders;

use std::sync::Arc;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::config::StorefrontConfig;

pub use account::{PasswordChange, ProfileUpdate, Registration};
pub use cart::CartApi;
pub use catalog::ProductFilter;
pub use orders::CheckoutRequest;

use catalog::{CacheKey, CacheValue};

/// Upper bound on cached catalog responses.
const CACHE_CAPACITY: u64 = 1000;

/// How much of an unparsable error body is kept in the error message.
const ERROR_BODY_PREVIEW: usize = 200;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure or timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// The backend rejected the credentials or bearer token (401).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The response body did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An endpoint path could not be joined onto the base URL.
    #[error("Invalid endpoint {path}: {source}")]
    Url {
        path: String,
        #[source]
        source: url::ParseError,
    },
}

impl ApiError {
    /// Whether the backend answered 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Client for the Tienda REST API.
///
/// Cheap to clone; clones share the HTTP connection pool and catalog cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl ApiClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StorefrontConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("tienda/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(config.catalog_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
                cache,
            }),
        })
    }

    /// The base URL every endpoint is joined onto.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Drop every cached catalog response.
    pub fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
    }

    fn cache(&self) -> &Cache<CacheKey, CacheValue> {
        &self.inner.cache
    }

    /// Resolve a relative endpoint path.
    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|source| ApiError::Url {
                path: path.to_string(),
                source,
            })
    }

    /// Start a request, attaching the bearer token when one is given.
    fn request(&self, method: Method, url: Url, token: Option<&SecretString>) -> RequestBuilder {
        let builder = self.inner.client.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Send a request and decode a JSON response body.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = check_status(request.send().await?).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %preview(&body),
                "Failed to parse backend response"
            );
            ApiError::Parse(e.to_string())
        })
    }

    /// Send a request whose response body is not needed.
    async fn send_unit(&self, request: RequestBuilder) -> Result<(), ApiError> {
        check_status(request.send().await?).await?;
        Ok(())
    }
}

/// Map non-success responses to `ApiError`.
///
/// The backend reports failures as `{ "error": "..." }`; that message is used
/// when present, otherwise a prefix of the raw body.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            preview(&body)
        }
    });

    tracing::debug!(status = %status, message = %message, "Backend returned non-success status");

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized(message));
    }
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Extract the `error` (or `message`) field of a JSON error body.
fn error_message(body: &str) -> Option<String> {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: Option<String>,
        message: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .error
        .or(parsed.message)
        .filter(|m| !m.trim().is_empty())
}

fn preview(body: &str) -> String {
    body.chars().take(ERROR_BODY_PREVIEW).collect()
}
