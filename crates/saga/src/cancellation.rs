//! Order cancellation handler.

use std::sync::Arc;

use common::UserId;
use domain::{DomainError, Order, OrderError, OrderId, OrderService, OrderStore};
use stock_ledger::{StockLedger, StockStore};
use tracing::{info, warn};

use crate::compensation::release_lines;
use crate::error::{Result, SagaError};

/// Outcome of cancelling an order whose guard was won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancellation {
    /// Lines whose stock was returned.
    pub released: usize,
    /// Lines whose release failed and were left locked.
    pub failed: usize,
}

/// Cancels unpaid orders and returns their stock.
///
/// The status moves first, through the guarded Pending → Cancelled
/// transition; stock is released only by whoever wins that transition, so
/// an order is never released twice and a paid order never loses its stock.
/// Coupon redemptions are not reversed.
pub struct OrderCancellationHandler<S: StockStore, O: OrderStore> {
    ledger: Arc<StockLedger<S>>,
    orders: Arc<OrderService<O>>,
}

impl<S: StockStore, O: OrderStore> Clone for OrderCancellationHandler<S, O> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            orders: Arc::clone(&self.orders),
        }
    }
}

impl<S: StockStore, O: OrderStore> OrderCancellationHandler<S, O> {
    /// Creates a new cancellation handler.
    pub fn new(ledger: Arc<StockLedger<S>>, orders: Arc<OrderService<O>>) -> Self {
        Self { ledger, orders }
    }

    /// Returns the order service.
    pub fn orders(&self) -> &OrderService<O> {
        &self.orders
    }

    /// Cancels `order_id` on behalf of `user_id`.
    ///
    /// Fails with `OrderNotFound`, `Unauthorized` if the order belongs to
    /// someone else, or `InvalidState` unless the order is Pending. Once the
    /// order is Cancelled it stays Cancelled even if some releases fail.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: &OrderId,
        user_id: UserId,
        reason: &str,
    ) -> Result<Cancellation> {
        let order = self.load(order_id).await?;

        if order.user_id() != user_id {
            warn!(%order_id, %user_id, owner = %order.user_id(), "Cancellation by non-owner");
            return Err(SagaError::Unauthorized {
                order_id: order_id.clone(),
                user_id,
            });
        }
        if !order.status().can_cancel() {
            return Err(SagaError::InvalidState {
                order_id: order_id.clone(),
                current: order.status(),
                action: "cancel",
            });
        }

        let outcome = self.cancel_and_release(&order, reason).await?;
        metrics::counter!("order_cancellations_total").increment(1);
        info!(
            %order_id,
            %user_id,
            reason,
            released = outcome.released,
            failed = outcome.failed,
            "Order cancelled"
        );
        Ok(outcome)
    }

    /// Applies the guarded Pending → Cancelled transition and, only if it was
    /// won, releases every line.
    pub(crate) async fn cancel_and_release(
        &self,
        order: &Order,
        reason: &str,
    ) -> Result<Cancellation> {
        match self.orders.cancel_pending(order.id(), reason).await {
            Ok(()) => {}
            Err(DomainError::Order(OrderError::InvalidStateTransition {
                order_id,
                current,
                action,
            })) => {
                return Err(SagaError::InvalidState {
                    order_id,
                    current,
                    action,
                });
            }
            Err(DomainError::Order(OrderError::NotFound(order_id))) => {
                return Err(SagaError::OrderNotFound(order_id));
            }
            Err(e) => return Err(e.into()),
        }

        let lines: Vec<_> = order.lines.iter().map(|l| (l.sku_id, l.quantity)).collect();
        let failed = release_lines(&self.ledger, lines, reason).await;
        if failed > 0 {
            warn!(
                order_id = %order.id(),
                failed,
                "Order cancelled but some stock could not be released"
            );
        }

        Ok(Cancellation {
            released: order.line_count() - failed,
            failed,
        })
    }

    async fn load(&self, order_id: &OrderId) -> Result<Order> {
        match self.orders.get_order(order_id).await {
            Ok(order) => Ok(order),
            Err(DomainError::Order(OrderError::NotFound(_))) => {
                Err(SagaError::OrderNotFound(order_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
