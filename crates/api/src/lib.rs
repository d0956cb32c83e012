//! HTTP API server for order placement and the stock ledger.
//!
//! Provides REST endpoints for placing, querying and cancelling orders,
//! payment callbacks and stock lookups, with structured logging (tracing)
//! and Prometheus metrics. A background sweeper cancels orders that were
//! not paid in time.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{InMemoryOrderStore, OrderStore, PostgresOrderStore};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use stock_ledger::{InMemoryStockStore, PostgresStockStore, StockError, StockStore};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use state::{AppState, InMemoryAppState};

const MAX_DB_CONNECTIONS: u32 = 10;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: StockStore + 'static, O: OrderStore + 'static>(
    state: Arc<AppState<S, O>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S, O>))
        .route(
            "/orders",
            post(routes::orders::place::<S, O>).get(routes::orders::list::<S, O>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S, O>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S, O>))
        .route(
            "/orders/{id}/status",
            post(routes::orders::update_status::<S, O>),
        )
        .route("/orders/{id}/ship", post(routes::orders::ship::<S, O>))
        .route("/stock", post(routes::stock::create::<S, O>))
        .route("/stock/{sku_id}", get(routes::stock::get::<S, O>))
        .route(
            "/cart/lines",
            put(routes::cart::put_line::<S, O>).get(routes::cart::list::<S, O>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over in-memory stores.
pub fn create_default_state(config: &Config) -> Arc<InMemoryAppState> {
    Arc::new(AppState::new(
        InMemoryStockStore::new(),
        InMemoryOrderStore::new(),
        config,
        "memory",
    ))
}

/// Connects to PostgreSQL, applies migrations and creates application state
/// over the PostgreSQL stores.
pub async fn create_postgres_state(
    config: &Config,
    database_url: &str,
) -> Result<Arc<AppState<PostgresStockStore, PostgresOrderStore>>, StockError> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_DB_CONNECTIONS)
        .connect(database_url)
        .await?;

    let stock_store = PostgresStockStore::new(pool.clone());
    stock_store.run_migrations().await?;
    let order_store = PostgresOrderStore::new(pool);

    Ok(Arc::new(AppState::new(
        stock_store,
        order_store,
        config,
        "postgres",
    )))
}

/// Serves the API until `shutdown` resolves, running the expired order
/// sweeper alongside and stopping it once the server has drained.
pub async fn serve<S: StockStore + 'static, O: OrderStore + 'static>(
    state: Arc<AppState<S, O>>,
    metrics_handle: PrometheusHandle,
    config: &Config,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let (stop_tx, stop_rx) = watch::channel(false);
    let sweeper = state.sweeper();
    let interval = config.sweep_interval();
    let sweeper_task = tokio::spawn(async move { sweeper.run(interval, stop_rx).await });

    let app = create_app(state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    let _ = stop_tx.send(true);
    if let Err(e) = sweeper_task.await {
        tracing::warn!(error = %e, "expired order sweeper did not stop cleanly");
    }

    served
}
