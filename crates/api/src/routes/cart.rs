//! Cart endpoints backed by the in-process cart service.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::{Money, ProductId, SkuId};
use domain::OrderStore;
use saga::CartLine;
use serde::{Deserialize, Serialize};
use stock_ledger::StockStore;

use super::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

fn default_selected() -> bool {
    true
}

#[derive(Deserialize)]
pub struct PutCartLineRequest {
    pub sku_id: i64,
    pub product_id: i64,
    pub product_name: String,
    #[serde(default)]
    pub sku_specs: String,
    pub price_cents: i64,
    pub quantity: u32,
    #[serde(default = "default_selected")]
    pub selected: bool,
}

#[derive(Serialize)]
pub struct CartLineResponse {
    pub sku_id: i64,
    pub product_name: String,
    pub price_cents: i64,
    pub quantity: u32,
    pub subtotal_cents: i64,
}

/// PUT /cart/lines — add or replace a line in the caller's cart.
#[tracing::instrument(skip(state, req))]
pub async fn put_line<S: StockStore + 'static, O: OrderStore + 'static>(
    State(state): State<Arc<AppState<S, O>>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<PutCartLineRequest>,
) -> Result<Json<Vec<CartLineResponse>>, ApiError> {
    if req.quantity == 0 {
        return Err(ApiError::BadRequest("quantity must be positive".to_string()));
    }
    if req.price_cents < 0 {
        return Err(ApiError::BadRequest("price_cents must not be negative".to_string()));
    }
    if req.price_cents.checked_mul(i64::from(req.quantity)).is_none() {
        return Err(ApiError::BadRequest(
            "price_cents * quantity is out of range".to_string(),
        ));
    }

    let line = CartLine {
        sku_id: SkuId::new(req.sku_id),
        product_id: ProductId::new(req.product_id),
        product_name: req.product_name,
        sku_specs: req.sku_specs,
        price: Money::from_cents(req.price_cents),
        quantity: req.quantity,
    };
    state.cart.put_line(user_id, line, req.selected);

    Ok(Json(cart_view(&state, user_id)))
}

/// GET /cart/lines — the caller's cart.
pub async fn list<S: StockStore + 'static, O: OrderStore + 'static>(
    State(state): State<Arc<AppState<S, O>>>,
    CurrentUser(user_id): CurrentUser,
) -> Json<Vec<CartLineResponse>> {
    Json(cart_view(&state, user_id))
}

fn cart_view<S: StockStore, O: OrderStore>(
    state: &AppState<S, O>,
    user_id: common::UserId,
) -> Vec<CartLineResponse> {
    state
        .cart
        .lines(user_id)
        .into_iter()
        .map(|line| CartLineResponse {
            sku_id: line.sku_id.as_i64(),
            subtotal_cents: line.subtotal().cents(),
            product_name: line.product_name,
            price_cents: line.price.cents(),
            quantity: line.quantity,
        })
        .collect()
}
