//! Expired order sweeper.

use std::time::Duration;

use chrono::{DateTime, Utc};
use stock_ledger::StockStore;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use domain::OrderStore;

use crate::cancellation::OrderCancellationHandler;
use crate::error::{Result, SagaError};

/// Cancel reason recorded on swept orders.
pub const EXPIRED_REASON: &str = "expired";

/// Default number of orders reaped per sweep.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Reaps Pending orders past their expire time and returns their stock.
///
/// Uses the same guarded cancel-then-release path as user cancellation, so an
/// expiry racing a payment callback either cancels and releases, or loses the
/// transition and leaves the paid order alone.
pub struct ExpiredOrderSweeper<S: StockStore, O: OrderStore> {
    handler: OrderCancellationHandler<S, O>,
    batch_size: usize,
}

impl<S: StockStore, O: OrderStore> ExpiredOrderSweeper<S, O> {
    /// Creates a sweeper with the default batch size.
    pub fn new(handler: OrderCancellationHandler<S, O>) -> Self {
        Self::with_batch_size(handler, DEFAULT_BATCH_SIZE)
    }

    /// Creates a sweeper that reaps at most `batch_size` orders per sweep.
    pub fn with_batch_size(handler: OrderCancellationHandler<S, O>, batch_size: usize) -> Self {
        Self {
            handler,
            batch_size: batch_size.max(1),
        }
    }

    /// Reaps orders that expired at or before `now`. Returns how many were
    /// cancelled by this sweep.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let expired = self
            .handler
            .orders()
            .find_expired(now, self.batch_size)
            .await?;

        let mut reaped = 0;
        for header in expired {
            let order = match self.handler.orders().get_order(&header.order_id).await {
                Ok(order) => order,
                Err(e) => {
                    warn!(order_id = %header.order_id, error = %e, "Could not load expired order");
                    continue;
                }
            };

            match self.handler.cancel_and_release(&order, EXPIRED_REASON).await {
                Ok(outcome) => {
                    reaped += 1;
                    debug!(
                        order_id = %order.id(),
                        released = outcome.released,
                        failed = outcome.failed,
                        "Expired order cancelled"
                    );
                }
                Err(SagaError::InvalidState { current, .. }) => {
                    debug!(order_id = %order.id(), %current, "Expired order already moved on");
                }
                Err(e) => {
                    error!(order_id = %order.id(), error = %e, "Failed to cancel expired order");
                }
            }
        }

        if reaped > 0 {
            metrics::counter!("orders_expired_total").increment(reaped as u64);
            info!(reaped, "Expired orders swept");
        }
        Ok(reaped)
    }

    /// Sweeps every `interval` until `shutdown` flips to `true` or its sender
    /// is dropped.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs_f64(), "Expired order sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once(Utc::now()).await {
                        error!(error = %e, "Expired order sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Expired order sweeper stopped");
    }
}
