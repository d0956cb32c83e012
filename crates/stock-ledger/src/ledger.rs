use tracing::{debug, info, instrument, warn};

use crate::{
    MAX_QUANTITY, Result, SkuId, StockError, StockRecord, Version,
    retry::RetryPolicy,
    store::{GuardOutcome, StockStore},
};

/// Reserve and release stock with optimistic concurrency control.
///
/// The ledger never holds a lock between reading a record and writing it.
/// A reservation reads the current version, then issues a write guarded by
/// that version and by `available >= quantity`. A rejected guard means either
/// someone else wrote first or stock ran out; the ledger re-reads to tell the
/// two apart and retries conflicts according to its [`RetryPolicy`].
pub struct StockLedger<S> {
    store: S,
    retry: RetryPolicy,
}

impl<S: StockStore> StockLedger<S> {
    /// Creates a ledger with the default retry policy.
    pub fn new(store: S) -> Self {
        Self::with_retry_policy(store, RetryPolicy::default())
    }

    /// Creates a ledger with a custom retry policy.
    pub fn with_retry_policy(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the retry policy in use.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Provisions a new SKU with `total` units, all available.
    #[instrument(skip(self))]
    pub async fn create_stock(&self, sku_id: SkuId, total: u32) -> Result<StockRecord> {
        if total > MAX_QUANTITY {
            return Err(StockError::InvalidQuantity(total));
        }
        let record = StockRecord::provision(sku_id, total);
        self.store.insert(record.clone()).await?;
        info!(%sku_id, total, "Stock provisioned");
        Ok(record)
    }

    /// Returns the current record for a SKU.
    pub async fn get_stock(&self, sku_id: SkuId) -> Result<StockRecord> {
        self.store
            .get(sku_id)
            .await?
            .ok_or(StockError::NotFound(sku_id))
    }

    /// Moves `quantity` units from available to locked.
    ///
    /// Returns the record's new version. Fails with `InsufficientStock` as
    /// soon as a read shows too little available, and with `Conflict` once
    /// the retry budget is spent while stock was still sufficient.
    #[instrument(skip(self))]
    pub async fn reserve(&self, sku_id: SkuId, quantity: u32) -> Result<Version> {
        validate_quantity(quantity)?;

        let mut observed = Version::initial();
        for attempt in 1..=self.retry.max_attempts {
            let record = self.get_stock(sku_id).await?;
            if !record.can_reserve(quantity) {
                return Err(self.insufficient(&record, quantity));
            }
            observed = record.version;

            match self
                .store
                .try_reserve(sku_id, quantity, record.version)
                .await?
            {
                GuardOutcome::Applied(version) => {
                    metrics::counter!("stock_reservations_total").increment(1);
                    debug!(%sku_id, quantity, %version, attempt, "Stock reserved");
                    return Ok(version);
                }
                GuardOutcome::Rejected => {
                    metrics::counter!("stock_conflicts_total").increment(1);
                    debug!(%sku_id, quantity, expected = %record.version, attempt, "Reserve guard rejected");
                }
            }

            if attempt < self.retry.max_attempts {
                let delay = self.retry.backoff(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        // Out of attempts: report shortage if that is what stopped us.
        let record = self.get_stock(sku_id).await?;
        if !record.can_reserve(quantity) {
            return Err(self.insufficient(&record, quantity));
        }

        warn!(
            %sku_id,
            quantity,
            attempts = self.retry.max_attempts,
            "Reservation gave up after repeated conflicts"
        );
        Err(StockError::Conflict {
            sku_id,
            observed,
            attempts: self.retry.max_attempts,
        })
    }

    /// Moves `quantity` units from locked back to available.
    ///
    /// The guard only checks `locked >= quantity`, so a concurrent writer
    /// cannot make it fail spuriously; a single attempt is enough.
    #[instrument(skip(self))]
    pub async fn release(&self, sku_id: SkuId, quantity: u32) -> Result<Version> {
        validate_quantity(quantity)?;

        match self.store.try_release(sku_id, quantity).await? {
            GuardOutcome::Applied(version) => {
                metrics::counter!("stock_releases_total").increment(1);
                debug!(%sku_id, quantity, %version, "Stock released");
                Ok(version)
            }
            GuardOutcome::Rejected => {
                let record = self.get_stock(sku_id).await?;
                warn!(%sku_id, quantity, locked = record.locked, "Release rejected");
                Err(StockError::ReleaseRejected {
                    sku_id,
                    requested: quantity,
                    locked: record.locked,
                })
            }
        }
    }

    fn insufficient(&self, record: &StockRecord, quantity: u32) -> StockError {
        metrics::counter!("stock_insufficient_total").increment(1);
        StockError::InsufficientStock {
            sku_id: record.sku_id,
            requested: quantity,
            available: record.available,
        }
    }
}

fn validate_quantity(quantity: u32) -> Result<()> {
    if quantity == 0 || quantity > MAX_QUANTITY {
        return Err(StockError::InvalidQuantity(quantity));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::InMemoryStockStore;

    fn ledger() -> StockLedger<InMemoryStockStore> {
        StockLedger::with_retry_policy(InMemoryStockStore::new(), RetryPolicy::immediate(5))
    }

    #[tokio::test]
    async fn reserve_then_release_restores_counters() {
        let ledger = ledger();
        let sku = SkuId::new(1);
        ledger.create_stock(sku, 10).await.unwrap();

        assert_eq!(ledger.reserve(sku, 3).await.unwrap(), Version::new(1));
        assert_eq!(ledger.release(sku, 3).await.unwrap(), Version::new(2));

        let record = ledger.get_stock(sku).await.unwrap();
        assert_eq!(record.available, 10);
        assert_eq!(record.locked, 0);
        assert_eq!(record.version, Version::new(2));
    }

    #[tokio::test]
    async fn reserve_reports_insufficient_stock() {
        let ledger = ledger();
        let sku = SkuId::new(2);
        ledger.create_stock(sku, 2).await.unwrap();

        let err = ledger.reserve(sku, 3).await.unwrap_err();
        assert!(matches!(
            err,
            StockError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            }
        ));

        let record = ledger.get_stock(sku).await.unwrap();
        assert_eq!(record.version, Version::initial());
    }

    #[tokio::test]
    async fn reserve_unknown_sku_is_not_found() {
        let ledger = ledger();
        let err = ledger.reserve(SkuId::new(7), 1).await.unwrap_err();
        assert!(matches!(err, StockError::NotFound(_)));
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let ledger = ledger();
        let sku = SkuId::new(3);
        ledger.create_stock(sku, 1).await.unwrap();
        assert!(matches!(
            ledger.reserve(sku, 0).await,
            Err(StockError::InvalidQuantity(0))
        ));
        assert!(matches!(
            ledger.release(sku, 0).await,
            Err(StockError::InvalidQuantity(0))
        ));
    }

    #[tokio::test]
    async fn release_more_than_locked_is_rejected() {
        let ledger = ledger();
        let sku = SkuId::new(4);
        ledger.create_stock(sku, 5).await.unwrap();
        ledger.reserve(sku, 2).await.unwrap();

        let err = ledger.release(sku, 3).await.unwrap_err();
        assert!(matches!(
            err,
            StockError::ReleaseRejected {
                requested: 3,
                locked: 2,
                ..
            }
        ));
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn duplicate_provisioning_fails() {
        let ledger = ledger();
        let sku = SkuId::new(5);
        ledger.create_stock(sku, 5).await.unwrap();
        assert!(matches!(
            ledger.create_stock(sku, 5).await,
            Err(StockError::AlreadyExists(_))
        ));
    }

    /// Store whose reserve guard always loses, as if another writer bumped the
    /// version between every read and write.
    #[derive(Clone, Default)]
    struct AlwaysStale {
        inner: InMemoryStockStore,
        attempts: Arc<AtomicU32>,
    }

    #[async_trait]
    impl StockStore for AlwaysStale {
        async fn insert(&self, record: StockRecord) -> Result<()> {
            self.inner.insert(record).await
        }

        async fn get(&self, sku_id: SkuId) -> Result<Option<StockRecord>> {
            self.inner.get(sku_id).await
        }

        async fn try_reserve(&self, _: SkuId, _: u32, _: Version) -> Result<GuardOutcome> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Ok(GuardOutcome::Rejected)
        }

        async fn try_release(&self, sku_id: SkuId, quantity: u32) -> Result<GuardOutcome> {
            self.inner.try_release(sku_id, quantity).await
        }
    }

    #[tokio::test]
    async fn persistent_conflicts_exhaust_the_retry_budget() {
        let store = AlwaysStale::default();
        let attempts = store.attempts.clone();
        let ledger = StockLedger::with_retry_policy(store, RetryPolicy::immediate(4));
        let sku = SkuId::new(6);
        ledger.create_stock(sku, 10).await.unwrap();

        let err = ledger.reserve(sku, 1).await.unwrap_err();
        assert!(matches!(err, StockError::Conflict { attempts: 4, .. }));
        assert!(err.is_conflict());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }
}
