//! Stock ledger endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::SkuId;
use domain::OrderStore;
use serde::{Deserialize, Serialize};
use stock_ledger::{StockRecord, StockStore};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateStockRequest {
    pub sku_id: i64,
    pub total: u32,
}

#[derive(Serialize)]
pub struct StockResponse {
    pub sku_id: i64,
    pub total: u32,
    pub available: u32,
    pub locked: u32,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<StockRecord> for StockResponse {
    fn from(record: StockRecord) -> Self {
        Self {
            sku_id: record.sku_id.as_i64(),
            total: record.total,
            available: record.available,
            locked: record.locked,
            version: record.version.as_i64(),
            updated_at: record.updated_at,
        }
    }
}

/// POST /stock — provision stock for a new SKU.
#[tracing::instrument(skip(state))]
pub async fn create<S: StockStore + 'static, O: OrderStore + 'static>(
    State(state): State<Arc<AppState<S, O>>>,
    Json(req): Json<CreateStockRequest>,
) -> Result<(StatusCode, Json<StockResponse>), ApiError> {
    let record = state
        .ledger
        .create_stock(SkuId::new(req.sku_id), req.total)
        .await?;
    Ok((StatusCode::CREATED, Json(StockResponse::from(record))))
}

/// GET /stock/{sku_id} — current counters and version for a SKU.
#[tracing::instrument(skip(state))]
pub async fn get<S: StockStore + 'static, O: OrderStore + 'static>(
    State(state): State<Arc<AppState<S, O>>>,
    Path(sku_id): Path<i64>,
) -> Result<Json<StockResponse>, ApiError> {
    let record = state.ledger.get_stock(SkuId::new(sku_id)).await?;
    Ok(Json(StockResponse::from(record)))
}
