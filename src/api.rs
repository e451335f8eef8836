//! HTTP surface over the cart controller.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::checkout::{checkout, CheckoutConfig, CheckoutError, CheckoutHandoff};
use crate::controller::CartController;
use crate::domain::aggregates::{Cart, CartError, LineItem, LineItemCandidate};
use crate::domain::pricing::{format_price, CartTotals};
use crate::domain::value_objects::AccountId;
use crate::session::SessionHub;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<Mutex<CartController>>,
    pub sessions: SessionHub,
    pub checkout: Arc<CheckoutConfig>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "childlike-storefront"})) }))
        .route("/api/v1/cart", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/items", post(add_item))
        .route("/api/v1/cart/items/:product_id", put(update_quantity).delete(remove_item))
        .route("/api/v1/cart/items/:product_id/increment", post(increment))
        .route("/api/v1/cart/items/:product_id/decrement", post(decrement))
        .route("/api/v1/session/sign-in", post(sign_in))
        .route("/api/v1/session/sign-out", post(sign_out))
        .route("/api/v1/checkout", post(start_checkout))
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub account_id: Option<String>,
    pub items: Vec<LineItem>,
    pub item_count: u32,
    pub subtotal: f64,
    pub formatted_subtotal: String,
    pub totals: CartTotals,
}

impl CartView {
    fn new(cart: &Cart, account: Option<&AccountId>) -> Self {
        Self {
            account_id: account.map(|a| a.to_string()),
            items: cart.items().to_vec(),
            item_count: cart.item_count(),
            subtotal: cart.subtotal(),
            formatted_subtotal: format_price(cart.subtotal()),
            totals: CartTotals::for_items(cart.items()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
    #[error("account id must not be empty")]
    InvalidAccount,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Cart(_) | ApiError::InvalidAccount => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Checkout(_) => StatusCode::CONFLICT,
        };
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn view(state: &AppState) -> Json<CartView> {
    let controller = state.controller.lock().await;
    Json(CartView::new(controller.cart(), controller.account()))
}

async fn get_cart(State(s): State<AppState>) -> Json<CartView> { view(&s).await }

async fn add_item(State(s): State<AppState>, Json(candidate): Json<LineItemCandidate>) -> ApiResult<(StatusCode, Json<CartView>)> {
    let mut controller = s.controller.lock().await;
    controller.add_item(candidate)?;
    Ok((StatusCode::CREATED, Json(CartView::new(controller.cart(), controller.account()))))
}

#[derive(Debug, Deserialize)] pub struct UpdateQuantityRequest { pub quantity: i64 }

async fn update_quantity(State(s): State<AppState>, Path(product_id): Path<String>, Json(r): Json<UpdateQuantityRequest>) -> Json<CartView> {
    s.controller.lock().await.update_quantity(&product_id, r.quantity);
    view(&s).await
}

async fn increment(State(s): State<AppState>, Path(product_id): Path<String>) -> Json<CartView> {
    s.controller.lock().await.increment(&product_id);
    view(&s).await
}

async fn decrement(State(s): State<AppState>, Path(product_id): Path<String>) -> Json<CartView> {
    s.controller.lock().await.decrement(&product_id);
    view(&s).await
}

async fn remove_item(State(s): State<AppState>, Path(product_id): Path<String>) -> Json<CartView> {
    s.controller.lock().await.remove_item(&product_id);
    view(&s).await
}

async fn clear_cart(State(s): State<AppState>) -> Json<CartView> {
    s.controller.lock().await.clear();
    view(&s).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest { pub account_id: String }

/// Publishes the transition; the session listener resolves the cart shortly after.
async fn sign_in(State(s): State<AppState>, Json(r): Json<SignInRequest>) -> ApiResult<StatusCode> {
    let account = AccountId::new(r.account_id).map_err(|_| ApiError::InvalidAccount)?;
    s.sessions.sign_in(account);
    Ok(StatusCode::ACCEPTED)
}

async fn sign_out(State(s): State<AppState>) -> StatusCode {
    s.sessions.sign_out();
    StatusCode::ACCEPTED
}

async fn start_checkout(State(s): State<AppState>) -> ApiResult<Json<CheckoutHandoff>> {
    let controller = s.controller.lock().await;
    Ok(Json(checkout(&s.checkout, controller.cart())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::spawn_session_listener;
    use crate::session::SessionNotifier;
    use crate::store::local::{LocalCartStore, MemorySlot};
    use crate::store::remote::MemoryCartStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn state(remote: MemoryCartStore) -> AppState {
        let controller = CartController::new(LocalCartStore::new(MemorySlot::default()), Arc::new(remote));
        AppState { controller: Arc::new(Mutex::new(controller)), sessions: SessionHub::default(), checkout: Arc::new(CheckoutConfig::placeholder()) }
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri).header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn cookie(quantity: i64) -> Value {
        json!({"productId": "chewy-protein-cookie", "slug": "chewy-protein-cookie", "name": "Chewy Protein Cookie", "unitPrice": 120, "quantity": quantity})
    }

    #[tokio::test]
    async fn test_cart_lifecycle() {
        let app = router(state(MemoryCartStore::new()));
        let (status, body) = call(&app, "POST", "/api/v1/cart/items", Some(cookie(2))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["itemCount"], 2);
        assert_eq!(body["formattedSubtotal"], "₱240.00");

        let (_, body) = call(&app, "POST", "/api/v1/cart/items/chewy-protein-cookie/increment", None).await;
        assert_eq!(body["itemCount"], 3);
        let (_, body) = call(&app, "PUT", "/api/v1/cart/items/chewy-protein-cookie", Some(json!({"quantity": 0}))).await;
        assert_eq!(body["itemCount"], 0);
        let (status, body) = call(&app, "DELETE", "/api/v1/cart/items/chewy-protein-cookie", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"], json!([]));
    }

    #[tokio::test]
    async fn test_invalid_item_rejected() {
        let app = router(state(MemoryCartStore::new()));
        let (status, body) = call(&app, "POST", "/api/v1/cart/items", Some(cookie(100))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].is_string());
        let (_, body) = call(&app, "GET", "/api/v1/cart", None).await;
        assert_eq!(body["itemCount"], 0);
    }

    #[tokio::test]
    async fn test_checkout() {
        let app = router(state(MemoryCartStore::new()));
        let (status, _) = call(&app, "POST", "/api/v1/checkout", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        call(&app, "POST", "/api/v1/cart/items", Some(cookie(1))).await;
        let (status, body) = call(&app, "POST", "/api/v1/checkout", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["url"], "https://buy.stripe.com/XXXXXX");
        assert_eq!(body["line_items"][0]["price_data"]["unit_amount"], 12000);
    }

    #[tokio::test]
    async fn test_sign_in_restores_remote_cart() {
        let remote = MemoryCartStore::new();
        let account = AccountId::new("acct-1").unwrap();
        remote.seed(&account, vec![cookie(4)]);
        let state = state(remote);
        let listener = spawn_session_listener(state.controller.clone(), state.sessions.subscribe());
        let app = router(state);

        let (status, _) = call(&app, "POST", "/api/v1/session/sign-in", Some(json!({"accountId": "acct-1"}))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let mut body = Value::Null;
        for _ in 0..50 {
            body = call(&app, "GET", "/api/v1/cart", None).await.1;
            if body["accountId"] == "acct-1" { break; }
            tokio::task::yield_now().await;
        }
        assert_eq!(body["itemCount"], 4);

        let (status, _) = call(&app, "POST", "/api/v1/session/sign-in", Some(json!({"accountId": " "}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        listener.abort();
    }
}
