use async_trait::async_trait;

use crate::{Result, SkuId, StockRecord, Version};

/// Result of a single guarded write against a stock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The guard matched and the write was applied; carries the new version.
    Applied(Version),
    /// The guard did not match (or the row is missing); nothing was written.
    Rejected,
}

/// Storage backend for stock records.
///
/// Implementations must make each guarded write atomic with respect to
/// every other write on the same SKU: the guard is evaluated and the
/// counters updated as one step, the way a single conditional `UPDATE`
/// behaves in a relational store. No method retries; that policy lives in
/// [`crate::StockLedger`].
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Inserts a new record. Fails with `AlreadyExists` if the SKU is known.
    async fn insert(&self, record: StockRecord) -> Result<()>;

    /// Fetches the current record for a SKU.
    async fn get(&self, sku_id: SkuId) -> Result<Option<StockRecord>>;

    /// Moves `quantity` from available to locked, guarded by
    /// `available >= quantity AND version = expected`.
    async fn try_reserve(
        &self,
        sku_id: SkuId,
        quantity: u32,
        expected: Version,
    ) -> Result<GuardOutcome>;

    /// Moves `quantity` from locked back to available, guarded by
    /// `locked >= quantity`.
    async fn try_release(&self, sku_id: SkuId, quantity: u32) -> Result<GuardOutcome>;
}
