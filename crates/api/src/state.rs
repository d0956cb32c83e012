//! Shared application state.

use std::sync::Arc;

use common::Money;
use domain::{InMemoryOrderStore, OrderService, OrderStore};
use saga::{
    ExpiredOrderSweeper, InMemoryCartService, InMemoryPromotionService,
    OrderCancellationHandler, OrderPlacementOrchestrator, PlacementConfig,
};
use stock_ledger::{InMemoryStockStore, RetryPolicy, StockLedger, StockStore};

use crate::config::Config;

/// The placement orchestrator wired to the in-process cart and promotion services.
pub type Orchestrator<S, O> =
    OrderPlacementOrchestrator<S, O, InMemoryCartService, InMemoryPromotionService>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: StockStore, O: OrderStore> {
    pub ledger: Arc<StockLedger<S>>,
    pub orders: Arc<OrderService<O>>,
    pub placement: Orchestrator<S, O>,
    pub cancellation: OrderCancellationHandler<S, O>,
    pub cart: InMemoryCartService,
    pub promotions: InMemoryPromotionService,
    /// Which storage backend the stores use, reported by `/health`.
    pub storage: &'static str,
}

impl<S: StockStore, O: OrderStore> AppState<S, O> {
    /// Wires the ledger, order service and sagas over the given stores.
    pub fn new(stock_store: S, order_store: O, config: &Config, storage: &'static str) -> Self {
        let retry = RetryPolicy::with_max_attempts(config.stock_retry_attempts);
        let ledger = Arc::new(StockLedger::with_retry_policy(stock_store, retry));
        let orders = Arc::new(OrderService::new(order_store));
        let cart = InMemoryCartService::new();
        let promotions = InMemoryPromotionService::new();

        let placement = OrderPlacementOrchestrator::with_config(
            ledger.clone(),
            orders.clone(),
            cart.clone(),
            promotions.clone(),
            PlacementConfig {
                order_ttl: config.order_ttl(),
                freight_amount: Money::zero(),
            },
        );
        let cancellation = OrderCancellationHandler::new(ledger.clone(), orders.clone());

        Self {
            ledger,
            orders,
            placement,
            cancellation,
            cart,
            promotions,
            storage,
        }
    }

    /// Builds a sweeper that cancels expired orders through this state's handler.
    pub fn sweeper(&self) -> ExpiredOrderSweeper<S, O> {
        ExpiredOrderSweeper::new(self.cancellation.clone())
    }
}

/// Application state over in-memory stores.
pub type InMemoryAppState = AppState<InMemoryStockStore, InMemoryOrderStore>;
