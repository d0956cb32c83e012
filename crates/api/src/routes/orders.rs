//! Order placement, query and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{AddressId, CouponId};
use domain::{Order, OrderHeader, OrderId, OrderLine, OrderStatus, OrderStore, PageRequest};
use serde::{Deserialize, Serialize};
use stock_ledger::StockStore;

use super::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u32 = 10;
const USER_CANCEL_REASON: &str = "cancelled by user";

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub address_id: i64,
    #[serde(default)]
    pub coupon_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Deserialize, Default)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderPlacedResponse {
    pub order_id: String,
    pub pay_amount_cents: i64,
    pub expire_time: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderSummaryResponse {
    pub order_id: String,
    pub user_id: i64,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub discount_cents: i64,
    pub freight_cents: i64,
    pub pay_cents: i64,
    pub coupon_id: Option<i64>,
    pub cancel_reason: Option<String>,
    pub expire_time: DateTime<Utc>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub sku_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub sku_specs: String,
    pub price_cents: i64,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub summary: OrderSummaryResponse,
    pub address_snapshot: serde_json::Value,
    pub lines: Vec<OrderLineResponse>,
}

#[derive(Serialize)]
pub struct CancellationResponse {
    pub order_id: String,
    pub status: OrderStatus,
    pub released_lines: usize,
    pub failed_lines: usize,
}

impl From<&OrderHeader> for OrderSummaryResponse {
    fn from(header: &OrderHeader) -> Self {
        Self {
            order_id: header.order_id.to_string(),
            user_id: header.user_id.as_i64(),
            status: header.status,
            total_cents: header.pricing.total_amount.cents(),
            discount_cents: header.pricing.discount_amount.cents(),
            freight_cents: header.pricing.freight_amount.cents(),
            pay_cents: header.pricing.pay_amount.cents(),
            coupon_id: header.coupon_id.map(|c| c.as_i64()),
            cancel_reason: header.cancel_reason.clone(),
            expire_time: header.expire_time,
            create_time: header.create_time,
            update_time: header.update_time,
        }
    }
}

impl From<&OrderLine> for OrderLineResponse {
    fn from(line: &OrderLine) -> Self {
        Self {
            sku_id: line.sku_id.as_i64(),
            product_id: line.product_id.as_i64(),
            product_name: line.product_name.clone(),
            sku_specs: line.sku_specs.clone(),
            price_cents: line.price.cents(),
            quantity: line.quantity,
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            summary: OrderSummaryResponse::from(&order.header),
            address_snapshot: order.header.address_snapshot.as_json().clone(),
            lines: order.lines.iter().map(OrderLineResponse::from).collect(),
        }
    }
}

// -- Handlers --

/// POST /orders — place an order for the caller's selected cart lines.
#[tracing::instrument(skip(state, req))]
pub async fn place<S: StockStore + 'static, O: OrderStore + 'static>(
    State(state): State<Arc<AppState<S, O>>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError> {
    if req.address_id <= 0 {
        return Err(ApiError::BadRequest("address_id must be positive".to_string()));
    }
    let coupon_id = CouponId::new(req.coupon_id.unwrap_or(0));

    let placed = state
        .placement
        .place_order(user_id, coupon_id, AddressId::new(req.address_id))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderPlacedResponse {
            order_id: placed.order_id.to_string(),
            pay_amount_cents: placed.pay_amount.cents(),
            expire_time: placed.expire_time,
        }),
    ))
}

/// GET /orders — list the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: StockStore + 'static, O: OrderStore + 'static>(
    State(state): State<Arc<AppState<S, O>>>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderSummaryResponse>>, ApiError> {
    let page = PageRequest::new(
        query.page.unwrap_or(1),
        query.size.unwrap_or(DEFAULT_PAGE_SIZE),
    );
    let headers = state
        .orders
        .list_for_user(user_id, query.status, page)
        .await?;

    Ok(Json(headers.iter().map(OrderSummaryResponse::from).collect()))
}

/// GET /orders/{id} — load one of the caller's orders with its lines.
#[tracing::instrument(skip(state))]
pub async fn get<S: StockStore + 'static, O: OrderStore + 'static>(
    State(state): State<Arc<AppState<S, O>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = OrderId::new(id);
    let order = state.orders.get_order(&order_id).await?;

    // Someone else's order is reported as missing.
    if order.user_id() != user_id {
        return Err(ApiError::NotFound(format!("Order {order_id} not found")));
    }

    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/cancel — cancel a Pending order and release its stock.
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: StockStore + 'static, O: OrderStore + 'static>(
    State(state): State<Arc<AppState<S, O>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    req: Option<Json<CancelOrderRequest>>,
) -> Result<Json<CancellationResponse>, ApiError> {
    let order_id = OrderId::new(id);
    let reason = req
        .and_then(|Json(body)| body.reason)
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| USER_CANCEL_REASON.to_string());

    let outcome = state
        .cancellation
        .cancel_order(&order_id, user_id, &reason)
        .await?;

    Ok(Json(CancellationResponse {
        order_id: order_id.to_string(),
        status: OrderStatus::Cancelled,
        released_lines: outcome.released,
        failed_lines: outcome.failed,
    }))
}

/// POST /orders/{id}/status — payment and fulfillment callback.
///
/// Applies a guarded transition; a callback that arrives after the order
/// left the required source status is rejected with 409.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: StockStore + 'static, O: OrderStore + 'static>(
    State(state): State<Arc<AppState<S, O>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderSummaryResponse>, ApiError> {
    let order_id = OrderId::new(id);
    // Cancellation must go through the handler so the stock is released.
    if req.status == OrderStatus::Cancelled {
        return Err(ApiError::BadRequest(format!(
            "Use /orders/{order_id}/cancel to cancel an order"
        )));
    }
    state.orders.update_status(&order_id, req.status).await?;

    let order = state.orders.get_order(&order_id).await?;
    Ok(Json(OrderSummaryResponse::from(&order.header)))
}

/// POST /orders/{id}/ship — hand a Paid order to fulfillment.
#[tracing::instrument(skip(state))]
pub async fn ship<S: StockStore + 'static, O: OrderStore + 'static>(
    State(state): State<Arc<AppState<S, O>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderSummaryResponse>, ApiError> {
    let order_id = OrderId::new(id);
    state.orders.ship(&order_id).await?;

    let order = state.orders.get_order(&order_id).await?;
    Ok(Json(OrderSummaryResponse::from(&order.header)))
}
