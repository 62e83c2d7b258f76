//! Integration tests for Basket Sync.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p basket-sync-integration-tests
//! ```
//!
//! Tests run against [`FakeRemoteStore`], an `axum` server bound to an
//! ephemeral port on `127.0.0.1` that speaks the remote store's REST API and
//! records every request it receives.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use url::Url;

use basket_sync::{Credentials, LocalSession, SyncConfig, UserRecord};
use basket_sync_core::UserId;

/// Bearer token the fake accepts.
pub const TOKEN: &str = "tok-integration";

/// A request as received by the fake.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Value,
    pub authorization: Option<String>,
}

/// A cart line held by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub product_id: String,
    pub variant_id: String,
    pub size: String,
    pub quantity: u32,
}

/// Mutable fake state. Tests edit it directly to script the remote side.
#[derive(Debug, Default)]
pub struct StoreState {
    pub cart: Vec<Line>,
    pub wishlist: Vec<String>,
    pub requests: Vec<RecordedRequest>,
    /// List endpoints answer 503 while set.
    pub lists_unavailable: bool,
    /// Every endpoint answers 429 while set.
    pub rate_limited: bool,
    /// Every endpoint answers 401 while set.
    pub revoked: bool,
}

impl StoreState {
    #[must_use]
    pub fn cart_count(&self) -> u32 {
        self.cart.iter().map(|line| line.quantity).sum()
    }

    /// Requests to `path`, in arrival order.
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests
            .iter()
            .filter(|request| request.path == path)
            .cloned()
            .collect()
    }
}

type SharedState = Arc<Mutex<StoreState>>;

/// Remote store stand-in served over HTTP.
pub struct FakeRemoteStore {
    addr: SocketAddr,
    state: SharedState,
    task: JoinHandle<()>,
}

impl FakeRemoteStore {
    /// Bind to an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let state = SharedState::default();
        let app = router(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake remote store");
        let addr = listener
            .local_addr()
            .expect("Failed to read fake remote store address");
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state, task }
    }

    /// Base URL the gateway should be configured with.
    ///
    /// # Panics
    ///
    /// Panics if the bound address does not form a valid URL.
    #[must_use]
    pub fn api_url(&self) -> Url {
        Url::parse(&format!("http://{}/api/", self.addr)).expect("Invalid fake store URL")
    }

    /// Defaults plus this store's URL.
    #[must_use]
    pub fn config(&self) -> SyncConfig {
        SyncConfig::new(self.api_url())
    }

    /// Lock the fake's state.
    pub fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for FakeRemoteStore {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A memory-only session signed in with [`TOKEN`].
///
/// # Panics
///
/// Panics if login fails, which a memory-only session never does.
#[must_use]
pub fn signed_in_session() -> LocalSession {
    let session = LocalSession::in_memory();
    session
        .login(Credentials::new(
            TOKEN,
            UserRecord {
                id: UserId::new("u-integration"),
                name: Some("Integration".to_string()),
                phone: None,
            },
        ))
        .expect("in-memory login cannot fail");
    session
}

/// How long [`eventually`] waits before giving up.
const EVENTUALLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll `condition` every few milliseconds until it holds.
///
/// # Panics
///
/// Panics naming `what` if `condition` still fails after five seconds.
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(EVENTUALLY_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

// =============================================================================
// Routes
// =============================================================================

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/cart/list", get(list_cart))
        .route("/api/cart/add", post(add_cart))
        .route("/api/cart/update", post(update_cart))
        .route("/api/cart/remove", post(remove_cart))
        .route("/api/cart/clear", post(clear_cart))
        .route("/api/wishlist/list", get(list_wishlist))
        .route("/api/wishlist/add", post(add_wishlist))
        .route("/api/wishlist/remove/{product_id}", delete(remove_wishlist))
        .route("/api/wishlist/move-to-cart", post(move_to_cart))
        .route("/api/wishlist/bulk-move-to-cart", post(bulk_move_to_cart))
        .route("/api/products/{product_id}", get(product))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineBody {
    product_id: String,
    variant_id: String,
    size: String,
    #[serde(default)]
    quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductBody {
    product_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductsBody {
    product_ids: Vec<String>,
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Record the request and enforce auth and scripted failures.
fn admit<'a>(
    state: &'a SharedState,
    method: Method,
    path: String,
    headers: &HeaderMap,
    body: Value,
) -> Result<MutexGuard<'a, StoreState>, Response> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    guard.requests.push(RecordedRequest {
        method,
        path,
        body,
        authorization: authorization.clone(),
    });

    let expected = format!("Bearer {TOKEN}");
    if guard.revoked || authorization.as_deref() != Some(expected.as_str()) {
        return Err(error(StatusCode::UNAUTHORIZED, "Unauthorized"));
    }
    if guard.rate_limited {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "7")],
            Json(json!({ "message": "slow down" })),
        )
            .into_response());
    }
    Ok(guard)
}

fn cart_line_json(line: &Line) -> Value {
    json!({
        "product": {
            "_id": line.product_id,
            "name": format!("Saree {}", line.product_id),
            "slug": format!("saree-{}", line.product_id),
            "price": 1200,
            "images": [],
        },
        "variantId": line.variant_id,
        "size": line.size,
        "quantity": line.quantity,
    })
}

async fn list_cart(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let guard = match admit(&state, Method::GET, "cart/list".into(), &headers, Value::Null) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    if guard.lists_unavailable {
        return error(StatusCode::SERVICE_UNAVAILABLE, "maintenance");
    }
    let items: Vec<Value> = guard.cart.iter().map(cart_line_json).collect();
    Json(json!({ "items": items })).into_response()
}

async fn add_cart(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = match admit(&state, Method::POST, "cart/add".into(), &headers, body.clone()) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let Ok(line) = serde_json::from_value::<LineBody>(body) else {
        return error(StatusCode::BAD_REQUEST, "invalid cart line");
    };
    if let Some(existing) = guard.cart.iter_mut().find(|l| {
        l.product_id == line.product_id && l.variant_id == line.variant_id && l.size == line.size
    }) {
        existing.quantity += line.quantity;
    } else {
        guard.cart.push(Line {
            product_id: line.product_id,
            variant_id: line.variant_id,
            size: line.size,
            quantity: line.quantity,
        });
    }
    Json(json!({ "message": "added" })).into_response()
}

async fn update_cart(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = match admit(&state, Method::POST, "cart/update".into(), &headers, body.clone())
    {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let Ok(line) = serde_json::from_value::<LineBody>(body) else {
        return error(StatusCode::BAD_REQUEST, "invalid cart line");
    };
    let Some(existing) = guard.cart.iter_mut().find(|l| {
        l.product_id == line.product_id && l.variant_id == line.variant_id && l.size == line.size
    }) else {
        return error(StatusCode::NOT_FOUND, "Cart item not found");
    };
    existing.quantity = line.quantity;
    guard.cart.retain(|l| l.quantity > 0);
    Json(json!({ "message": "updated" })).into_response()
}

async fn remove_cart(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = match admit(&state, Method::POST, "cart/remove".into(), &headers, body.clone())
    {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let Ok(line) = serde_json::from_value::<LineBody>(body) else {
        return error(StatusCode::BAD_REQUEST, "invalid cart line");
    };
    guard.cart.retain(|l| {
        !(l.product_id == line.product_id && l.variant_id == line.variant_id && l.size == line.size)
    });
    StatusCode::NO_CONTENT.into_response()
}

async fn clear_cart(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let mut guard = match admit(&state, Method::POST, "cart/clear".into(), &headers, Value::Null) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    guard.cart.clear();
    StatusCode::NO_CONTENT.into_response()
}

async fn list_wishlist(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let guard = match admit(&state, Method::GET, "wishlist/list".into(), &headers, Value::Null) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    if guard.lists_unavailable {
        return error(StatusCode::SERVICE_UNAVAILABLE, "maintenance");
    }
    let items: Vec<Value> = guard
        .wishlist
        .iter()
        .enumerate()
        .map(|(n, product_id)| {
            json!({
                "_id": format!("w{n}"),
                "product": {
                    "_id": product_id,
                    "name": format!("Saree {product_id}"),
                    "slug": format!("saree-{product_id}"),
                    "price": 1500,
                    "images": [format!("https://cdn.example.test/{product_id}.jpg")],
                    "availability": "IN_STOCK",
                },
                "addedAt": "2024-05-01T10:00:00Z",
            })
        })
        .collect();
    Json(json!({ "items": items, "total": guard.wishlist.len() })).into_response()
}

async fn add_wishlist(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = match admit(&state, Method::POST, "wishlist/add".into(), &headers, body.clone())
    {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let Ok(ProductBody { product_id }) = serde_json::from_value(body) else {
        return error(StatusCode::BAD_REQUEST, "productId is required");
    };
    if guard.wishlist.contains(&product_id) {
        return error(StatusCode::CONFLICT, "Product already in wishlist");
    }
    guard.wishlist.push(product_id);
    Json(json!({ "message": "added" })).into_response()
}

async fn remove_wishlist(
    State(state): State<SharedState>,
    Path(product_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let path = format!("wishlist/remove/{product_id}");
    let mut guard = match admit(&state, Method::DELETE, path, &headers, Value::Null) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    guard.wishlist.retain(|id| *id != product_id);
    StatusCode::NO_CONTENT.into_response()
}

fn move_into_cart(guard: &mut StoreState, product_id: &str) {
    guard.wishlist.retain(|id| id != product_id);
    guard.cart.push(Line {
        product_id: product_id.to_owned(),
        variant_id: product_id.to_owned(),
        size: "Free Size".to_owned(),
        quantity: 1,
    });
}

async fn move_to_cart(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let path = "wishlist/move-to-cart".to_string();
    let mut guard = match admit(&state, Method::POST, path, &headers, body.clone()) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let Ok(ProductBody { product_id }) = serde_json::from_value(body) else {
        return error(StatusCode::BAD_REQUEST, "productId is required");
    };
    if !guard.wishlist.contains(&product_id) {
        return error(StatusCode::NOT_FOUND, "Product not in wishlist");
    }
    move_into_cart(&mut guard, &product_id);
    Json(json!({ "message": "moved" })).into_response()
}

async fn bulk_move_to_cart(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let path = "wishlist/bulk-move-to-cart".to_string();
    let mut guard = match admit(&state, Method::POST, path, &headers, body.clone()) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let Ok(ProductsBody { product_ids }) = serde_json::from_value(body) else {
        return error(StatusCode::BAD_REQUEST, "productIds is required");
    };
    let movable: Vec<String> = product_ids
        .into_iter()
        .filter(|id| guard.wishlist.contains(id))
        .collect();
    for product_id in &movable {
        move_into_cart(&mut guard, product_id);
    }
    Json(json!({ "message": "moved" })).into_response()
}

async fn product(
    State(state): State<SharedState>,
    Path(product_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let path = format!("products/{product_id}");
    if let Err(response) = admit(&state, Method::GET, path, &headers, Value::Null) {
        return response;
    }
    Json(json!({
        "_id": product_id,
        "variants": [{
            "variantId": format!("{product_id}-red"),
            "images": [format!("https://cdn.example.test/{product_id}-red.jpg")],
        }],
        "allImages": [format!("https://cdn.example.test/{product_id}.jpg")],
    }))
    .into_response()
}
