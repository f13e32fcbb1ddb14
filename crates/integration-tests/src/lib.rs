//! Integration tests for the Tienda storefront client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tienda-integration-tests
//! ```
//!
//! Every test spawns its own [`MockBackend`]: an in-process axum server that
//! speaks the subset of the Tienda REST API the client uses, keeps its state
//! in memory, and records every request so tests can assert on the exact
//! sequence of calls.
//!
//! # Test Categories
//!
//! - `cart_sync` - anonymous cart, login merge, authenticated cart operations
//! - `account` - login, session restore and expiry, profile
//! - `checkout` - order placement and history
//! - `catalog` - product browsing

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path as UrlPath, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use tienda_core::{
    Category, CategoryId, Email, Order, OrderId, OrderLine, OrderLineId, OrderStatus,
    PaymentMethod, Price, Product, ProductId, Quantity, UserId, UserProfile,
};
use tienda_storefront::{FileStore, NoticeLog, Storefront, StorefrontConfig};

/// Seeded customer.
pub const USER_EMAIL: &str = "ana@example.com";
pub const USER_PASSWORD: &str = "secreto1";
pub const USER_TOKEN: &str = "token-ana";

/// Seeded products.
pub const TAZA: ProductId = ProductId::new(1);
pub const PLATO: ProductId = ProductId::new(2);
pub const VASO: ProductId = ProductId::new(3);
pub const CUENCO: ProductId = ProductId::new(4);

// =============================================================================
// Backend state
// =============================================================================

struct Account {
    profile: UserProfile,
    password: String,
    token: String,
}

#[derive(Default)]
struct BackendState {
    products: Vec<Product>,
    categories: Vec<Category>,
    accounts: Vec<Account>,
    revoked: HashSet<String>,
    carts: HashMap<String, Vec<(ProductId, Quantity)>>,
    orders: HashMap<String, Vec<Order>>,
    requests: Vec<String>,
    next_order_id: i32,
}

impl BackendState {
    fn seeded() -> Self {
        let product = |id: i32, name: &str, price: &str, stock: u32, category: i32| Product {
            id: ProductId::new(id),
            name: name.to_string(),
            description: Some(format!("{name} de cerámica")),
            price: price.parse().unwrap_or(Price::ZERO),
            stock,
            images: vec![format!("/img/{id}.jpg")],
            category_id: Some(CategoryId::new(category)),
        };

        let mut state = Self {
            products: vec![
                product(1, "Taza", "12.50", 30, 1),
                product(2, "Plato", "8.00", 5, 1),
                product(3, "Vaso", "3.25", 0, 2),
                product(4, "Cuenco", "6.75", 12, 1),
            ],
            categories: vec![
                Category {
                    id: CategoryId::new(1),
                    name: "Vajilla".to_string(),
                    description: Some("Platos, tazas y cuencos".to_string()),
                    image: None,
                },
                Category {
                    id: CategoryId::new(2),
                    name: "Cristalería".to_string(),
                    description: None,
                    image: None,
                },
            ],
            next_order_id: 100,
            ..Self::default()
        };

        if let Ok(email) = Email::parse(USER_EMAIL) {
            state.accounts.push(Account {
                profile: UserProfile {
                    id: UserId::new(1),
                    name: "Ana".to_string(),
                    email,
                    phone: None,
                    address: Some("Calle Mayor 1".to_string()),
                    role: "cliente".to_string(),
                    registered_at: None,
                },
                password: USER_PASSWORD.to_string(),
                token: USER_TOKEN.to_string(),
            });
        }
        state
    }

    fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    fn account(&self, token: &str) -> Option<&Account> {
        if self.revoked.contains(token) {
            return None;
        }
        self.accounts.iter().find(|a| a.token == token)
    }

    fn account_mut(&mut self, token: &str) -> Option<&mut Account> {
        if self.revoked.contains(token) {
            return None;
        }
        self.accounts.iter_mut().find(|a| a.token == token)
    }
}

type SharedState = Arc<Mutex<BackendState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, BackendState> {
    state
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

// =============================================================================
// Errors
// =============================================================================

/// An error response in the backend's `{ "error": ... }` shape.
struct Failure(StatusCode, String);

impl Failure {
    fn unauthorized() -> Self {
        Self(StatusCode::UNAUTHORIZED, "Token inválido o expirado".to_string())
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, message.into())
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self(StatusCode::NOT_FOUND, message.into())
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

type Reply = Result<Json<Value>, Failure>;

fn bearer(headers: &HeaderMap) -> Result<String, Failure> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .ok_or_else(Failure::unauthorized)
}

/// The token of an active account.
fn authorize(state: &BackendState, headers: &HeaderMap) -> Result<String, Failure> {
    let token = bearer(headers)?;
    state.account(&token).ok_or_else(Failure::unauthorized)?;
    Ok(token)
}

fn quantity(raw: i64) -> Result<Quantity, Failure> {
    Quantity::new(raw).map_err(|e| Failure::bad_request(e.to_string()))
}

// =============================================================================
// Handlers: catalog
// =============================================================================

async fn list_products(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    let state = lock(&state);
    let search = params.get("search").map(|s| s.to_lowercase());
    let category = params.get("categoria").and_then(|c| c.parse::<CategoryId>().ok());
    let featured = params.get("featured").is_some_and(|f| f == "true");

    let products: Vec<&Product> = state
        .products
        .iter()
        .filter(|p| {
            search
                .as_ref()
                .is_none_or(|s| p.name.to_lowercase().contains(s))
        })
        .filter(|p| category.is_none_or(|c| p.category_id == Some(c)))
        .take(if featured { 2 } else { usize::MAX })
        .collect();

    Ok(Json(json!(products)))
}

async fn show_product(State(state): State<SharedState>, UrlPath(id): UrlPath<i32>) -> Reply {
    let state = lock(&state);
    state
        .product(ProductId::new(id))
        .map(|p| Json(json!(p)))
        .ok_or_else(|| Failure::not_found("Producto no encontrado"))
}

async fn list_categories(State(state): State<SharedState>) -> Reply {
    Ok(Json(json!(lock(&state).categories)))
}

async fn category_products(
    State(state): State<SharedState>,
    UrlPath(id): UrlPath<i32>,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    let state = lock(&state);
    let category = CategoryId::new(id);
    let exclude = params.get("exclude").and_then(|e| e.parse::<ProductId>().ok());
    let limit = params
        .get("limit")
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(usize::MAX);

    let products: Vec<&Product> = state
        .products
        .iter()
        .filter(|p| p.category_id == Some(category) && Some(p.id) != exclude)
        .take(limit)
        .collect();

    Ok(Json(json!(products)))
}

// =============================================================================
// Handlers: account
// =============================================================================

#[derive(Deserialize)]
struct Credentials {
    correo: String,
    #[serde(rename = "contraseña")]
    password: String,
}

async fn login(State(state): State<SharedState>, Json(body): Json<Credentials>) -> Reply {
    let mut state = lock(&state);
    let token = state
        .accounts
        .iter()
        .find(|a| a.profile.email.as_str() == body.correo && a.password == body.password)
        .map(|a| a.token.clone())
        .ok_or_else(|| Failure(StatusCode::UNAUTHORIZED, "Credenciales inválidas".to_string()))?;

    state.revoked.remove(&token);
    Ok(Json(json!({ "token": token })))
}

async fn me(State(state): State<SharedState>, headers: HeaderMap) -> Reply {
    let state = lock(&state);
    let token = authorize(&state, &headers)?;
    let account = state.account(&token).ok_or_else(Failure::unauthorized)?;
    Ok(Json(json!({ "user": account.profile })))
}

#[derive(Deserialize)]
struct NewAccount {
    nombre: String,
    correo: String,
    #[serde(rename = "contraseña")]
    password: String,
    telefono: Option<String>,
    direccion: Option<String>,
}

async fn register(State(state): State<SharedState>, Json(body): Json<NewAccount>) -> Reply {
    let mut state = lock(&state);
    if state
        .accounts
        .iter()
        .any(|a| a.profile.email.as_str() == body.correo)
    {
        return Err(Failure::bad_request("El correo ya está registrado"));
    }

    let email = Email::parse(&body.correo).map_err(|e| Failure::bad_request(e.to_string()))?;
    let id = i32::try_from(state.accounts.len()).unwrap_or(i32::MAX) + 1;
    state.accounts.push(Account {
        profile: UserProfile {
            id: UserId::new(id),
            name: body.nombre,
            email,
            phone: body.telefono,
            address: body.direccion,
            role: "cliente".to_string(),
            registered_at: None,
        },
        password: body.password,
        token: format!("token-{id}"),
    });

    Ok(Json(json!({ "message": "Usuario registrado correctamente" })))
}

async fn profile(State(state): State<SharedState>, headers: HeaderMap) -> Reply {
    me(State(state), headers).await
}

#[derive(Deserialize)]
struct ProfileBody {
    nombre: String,
    telefono: Option<String>,
    direccion: Option<String>,
}

async fn update_profile(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<ProfileBody>,
) -> Result<StatusCode, Failure> {
    let mut state = lock(&state);
    let token = bearer(&headers)?;
    let account = state.account_mut(&token).ok_or_else(Failure::unauthorized)?;
    account.profile.name = body.nombre;
    account.profile.phone = body.telefono;
    account.profile.address = body.direccion;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct PasswordBody {
    #[serde(rename = "contraseñaActual")]
    current: String,
    #[serde(rename = "nuevaContraseña")]
    new: String,
}

async fn change_password(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<PasswordBody>,
) -> Reply {
    let mut state = lock(&state);
    let token = bearer(&headers)?;
    let account = state.account_mut(&token).ok_or_else(Failure::unauthorized)?;
    if account.password != body.current {
        return Err(Failure::bad_request("La contraseña actual es incorrecta"));
    }
    account.password = body.new;
    Ok(Json(json!({ "message": "Contraseña actualizada" })))
}

// =============================================================================
// Handlers: cart
// =============================================================================

#[derive(Deserialize)]
struct CartLine {
    #[serde(rename = "productoId")]
    product_id: ProductId,
    cantidad: i64,
}

async fn show_cart(State(state): State<SharedState>, headers: HeaderMap) -> Reply {
    let state = lock(&state);
    let token = authorize(&state, &headers)?;

    let items: Vec<Value> = state
        .carts
        .get(&token)
        .into_iter()
        .flatten()
        .map(|(id, qty)| json!({ "product": state.product(*id), "cantidad": qty }))
        .collect();

    Ok(Json(json!({ "cartItems": items })))
}

async fn add_to_cart(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<CartLine>,
) -> Result<StatusCode, Failure> {
    let mut state = lock(&state);
    let token = authorize(&state, &headers)?;
    let qty = quantity(body.cantidad)?;
    if state.product(body.product_id).is_none() {
        return Err(Failure::not_found("Producto no encontrado"));
    }

    let cart = state.carts.entry(token).or_default();
    match cart.iter_mut().find(|(id, _)| *id == body.product_id) {
        Some((_, existing)) => *existing = existing.saturating_add(qty),
        None => cart.push((body.product_id, qty)),
    }
    Ok(StatusCode::OK)
}

async fn update_cart(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<CartLine>,
) -> Result<StatusCode, Failure> {
    let mut state = lock(&state);
    let token = authorize(&state, &headers)?;
    let qty = quantity(body.cantidad)?;

    let line = state
        .carts
        .entry(token)
        .or_default()
        .iter_mut()
        .find(|(id, _)| *id == body.product_id)
        .ok_or_else(|| Failure::not_found("El producto no está en el carrito"))?;
    line.1 = qty;
    Ok(StatusCode::OK)
}

async fn remove_from_cart(
    State(state): State<SharedState>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<i32>,
) -> Result<StatusCode, Failure> {
    let mut state = lock(&state);
    let token = authorize(&state, &headers)?;
    let id = ProductId::new(id);
    let cart = state.carts.entry(token).or_default();
    if !cart.iter().any(|(product, _)| *product == id) {
        return Err(Failure::not_found("El producto no está en el carrito"));
    }
    cart.retain(|(product, _)| *product != id);
    Ok(StatusCode::OK)
}

async fn clear_cart(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<StatusCode, Failure> {
    let mut state = lock(&state);
    let token = authorize(&state, &headers)?;
    state.carts.remove(&token);
    Ok(StatusCode::OK)
}

// =============================================================================
// Handlers: orders
// =============================================================================

#[derive(Deserialize)]
struct CheckoutBody {
    #[serde(rename = "direccionEnvio")]
    shipping_address: String,
    #[serde(rename = "metodoPago")]
    payment_method: PaymentMethod,
}

async fn checkout(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<CheckoutBody>,
) -> Reply {
    let mut state = lock(&state);
    let token = authorize(&state, &headers)?;
    if body.shipping_address.trim().is_empty() {
        return Err(Failure::bad_request("La dirección de envío es obligatoria"));
    }

    let lines = state.carts.get(&token).cloned().unwrap_or_default();
    if lines.is_empty() {
        return Err(Failure::bad_request("El carrito está vacío"));
    }

    let items: Vec<OrderLine> = lines
        .iter()
        .zip(1..)
        .filter_map(|((id, qty), line_id)| {
            state.product(*id).map(|product| OrderLine {
                id: OrderLineId::new(line_id),
                quantity: *qty,
                unit_price: product.price,
                product: Some(product.clone()),
            })
        })
        .collect();

    let order = Order {
        id: OrderId::new(state.next_order_id),
        status: OrderStatus::Pending,
        total: items.iter().map(OrderLine::line_total).sum(),
        shipping_address: body.shipping_address,
        payment_method: body.payment_method,
        created_at: Some(chrono::Utc::now()),
        items,
    };

    state.next_order_id += 1;
    state.carts.remove(&token);
    state.orders.entry(token).or_default().push(order.clone());

    Ok(Json(json!({ "order": order })))
}

async fn list_orders(State(state): State<SharedState>, headers: HeaderMap) -> Reply {
    let state = lock(&state);
    let token = authorize(&state, &headers)?;
    let orders = state.orders.get(&token).cloned().unwrap_or_default();
    Ok(Json(json!(orders)))
}

// =============================================================================
// Server
// =============================================================================

async fn record_request(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    let line = format!("{} {}", request.method(), request.uri().path());
    tracing::debug!(request = %line, "Mock backend request");
    lock(&state).requests.push(line);
    next.run(request).await
}

fn router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/products", get(list_products))
        .route("/products/{id}", get(show_product))
        .route("/categories", get(list_categories))
        .route("/categories/{id}/products", get(category_products))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/users/register", post(register))
        .route("/profile", get(profile).put(update_profile))
        .route("/profile/password", put(change_password))
        .route("/carts", get(show_cart))
        .route("/carts/add", post(add_to_cart))
        .route("/carts/update", put(update_cart))
        .route("/carts/remove/{id}", delete(remove_from_cart))
        .route("/carts/clear", post(clear_cart))
        .route("/pedidos/checkout", post(checkout))
        .route("/pedidos", get(list_orders));

    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(state.clone(), record_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A Tienda backend running on an ephemeral local port.
///
/// The server task is aborted when the value is dropped.
pub struct MockBackend {
    addr: SocketAddr,
    state: SharedState,
    handle: JoinHandle<()>,
}

impl MockBackend {
    /// Start a backend seeded with a small catalog and one customer
    /// ([`USER_EMAIL`] / [`USER_PASSWORD`]).
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    #[allow(clippy::expect_used)]
    pub async fn spawn() -> Self {
        let state = Arc::new(Mutex::new(BackendState::seeded()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend address");

        let app = router(Arc::clone(&state));
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Mock backend stopped");
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Base URL of the REST API, as the client expects it.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// A storefront talking to this backend and persisting under `data_dir`.
    ///
    /// # Panics
    ///
    /// Panics if the storefront cannot be built.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn storefront(&self, data_dir: &Path, notices: &NoticeLog) -> Storefront {
        let config = StorefrontConfig::for_api_url(&self.api_url(), data_dir)
            .expect("mock backend URL is valid");
        Storefront::with_parts(
            config,
            Arc::new(FileStore::new(data_dir.to_path_buf())),
            Arc::new(notices.clone()),
        )
        .expect("build storefront")
    }

    /// Put a line into a customer's server cart without going through the API.
    pub fn seed_cart(&self, token: &str, product: ProductId, quantity: u32) {
        if let Ok(qty) = Quantity::new(i64::from(quantity)) {
            lock(&self.state)
                .carts
                .entry(token.to_string())
                .or_default()
                .push((product, qty));
        }
    }

    /// A customer's server cart as `(product, quantity)` pairs.
    #[must_use]
    pub fn cart_of(&self, token: &str) -> Vec<(ProductId, u32)> {
        lock(&self.state)
            .carts
            .get(token)
            .into_iter()
            .flatten()
            .map(|(id, qty)| (*id, qty.get()))
            .collect()
    }

    /// Number of orders a customer has placed.
    #[must_use]
    pub fn order_count(&self, token: &str) -> usize {
        lock(&self.state).orders.get(token).map_or(0, Vec::len)
    }

    /// Make the backend reject `token` until the customer logs in again.
    pub fn revoke(&self, token: &str) {
        lock(&self.state).revoked.insert(token.to_string());
    }

    /// Every request received so far, as `"METHOD /path"`.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        lock(&self.state).requests.clone()
    }

    /// Requests received so far whose path starts with `prefix`.
    #[must_use]
    pub fn requests_to(&self, prefix: &str) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.split_once(' ').is_some_and(|(_, path)| path.starts_with(prefix)))
            .collect()
    }

    pub fn clear_requests(&self) {
        lock(&self.state).requests.clear();
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
