//! Stock compensation shared by placement, cancellation and expiry.

use common::SkuId;
use stock_ledger::{StockLedger, StockStore};
use tracing::{debug, error};

/// Stock reservations made so far by one placement, in the order they were
/// made.
#[derive(Debug, Default)]
pub struct ReservedLines {
    lines: Vec<(SkuId, u32)>,
}

impl ReservedLines {
    /// Creates an empty record of reservations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful reservation.
    pub fn push(&mut self, sku_id: SkuId, quantity: u32) {
        self.lines.push((sku_id, quantity));
    }

    /// Returns the number of reservations recorded.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true if nothing has been reserved yet.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Releases every recorded reservation, most recent first.
    ///
    /// Best-effort: a failed release is logged and skipped, never retried.
    /// Returns the number of releases that failed.
    pub async fn release_all<S: StockStore>(self, ledger: &StockLedger<S>, context: &str) -> usize {
        metrics::counter!("order_compensations_total").increment(1);
        release_lines(ledger, self.lines.into_iter().rev(), context).await
    }
}

/// Releases each `(sku, quantity)` in iteration order, logging failures.
///
/// Returns the number of releases that failed.
pub async fn release_lines<S, I>(ledger: &StockLedger<S>, lines: I, context: &str) -> usize
where
    S: StockStore,
    I: IntoIterator<Item = (SkuId, u32)>,
{
    let mut failed = 0;
    for (sku_id, quantity) in lines {
        match ledger.release(sku_id, quantity).await {
            Ok(version) => debug!(%sku_id, quantity, %version, context, "Stock released"),
            Err(e) => {
                failed += 1;
                error!(%sku_id, quantity, context, error = %e, "Stock release failed");
            }
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use stock_ledger::{InMemoryStockStore, StockLedger};

    use super::*;

    #[tokio::test]
    async fn release_all_returns_reserved_stock() {
        let ledger = StockLedger::new(InMemoryStockStore::new());
        for sku in 1..=2 {
            ledger.create_stock(SkuId::new(sku), 5).await.unwrap();
        }

        let mut reserved = ReservedLines::new();
        ledger.reserve(SkuId::new(1), 2).await.unwrap();
        reserved.push(SkuId::new(1), 2);
        ledger.reserve(SkuId::new(2), 3).await.unwrap();
        reserved.push(SkuId::new(2), 3);
        assert_eq!(reserved.len(), 2);

        assert_eq!(reserved.release_all(&ledger, "test").await, 0);
        for sku in 1..=2 {
            let record = ledger.get_stock(SkuId::new(sku)).await.unwrap();
            assert_eq!((record.available, record.locked), (5, 0));
        }
    }

    #[tokio::test]
    async fn failed_release_does_not_stop_the_rest() {
        let ledger = StockLedger::new(InMemoryStockStore::new());
        ledger.create_stock(SkuId::new(1), 5).await.unwrap();
        ledger.reserve(SkuId::new(1), 2).await.unwrap();

        let failed = release_lines(
            &ledger,
            [(SkuId::new(99), 1), (SkuId::new(1), 2)],
            "test",
        )
        .await;
        assert_eq!(failed, 1);
        assert_eq!(ledger.get_stock(SkuId::new(1)).await.unwrap().locked, 0);
    }
}
