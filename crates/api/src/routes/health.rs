//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::OrderStore;
use serde::Serialize;
use stock_ledger::StockStore;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: &'static str,
}

/// GET /health — returns liveness and the storage backend in use.
pub async fn check<S: StockStore + 'static, O: OrderStore + 'static>(
    State(state): State<Arc<AppState<S, O>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        storage: state.storage,
    })
}
