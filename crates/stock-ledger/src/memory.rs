use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    Result, SkuId, StockError, StockRecord, Version,
    store::{GuardOutcome, StockStore},
};

/// In-memory stock store.
///
/// Each guarded write runs entirely under the write lock, which gives the
/// same per-row atomicity as a conditional `UPDATE`.
#[derive(Clone, Default)]
pub struct InMemoryStockStore {
    records: Arc<RwLock<HashMap<SkuId, StockRecord>>>,
}

impl InMemoryStockStore {
    /// Creates a new empty in-memory stock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of SKUs stored.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if no SKUs are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Returns a copy of every record.
    pub async fn all(&self) -> Vec<StockRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn insert(&self, record: StockRecord) -> Result<()> {
        record.validate()?;
        let mut records = self.records.write().await;
        if records.contains_key(&record.sku_id) {
            return Err(StockError::AlreadyExists(record.sku_id));
        }
        records.insert(record.sku_id, record);
        Ok(())
    }

    async fn get(&self, sku_id: SkuId) -> Result<Option<StockRecord>> {
        Ok(self.records.read().await.get(&sku_id).cloned())
    }

    async fn try_reserve(
        &self,
        sku_id: SkuId,
        quantity: u32,
        expected: Version,
    ) -> Result<GuardOutcome> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&sku_id) else {
            return Ok(GuardOutcome::Rejected);
        };

        if !record.can_reserve(quantity) || record.version != expected {
            return Ok(GuardOutcome::Rejected);
        }

        record.available -= quantity;
        record.locked += quantity;
        record.version = record.version.next();
        record.updated_at = Utc::now();
        Ok(GuardOutcome::Applied(record.version))
    }

    async fn try_release(&self, sku_id: SkuId, quantity: u32) -> Result<GuardOutcome> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&sku_id) else {
            return Ok(GuardOutcome::Rejected);
        };

        if !record.can_release(quantity) {
            return Ok(GuardOutcome::Rejected);
        }

        record.available += quantity;
        record.locked -= quantity;
        record.version = record.version.next();
        record.updated_at = Utc::now();
        Ok(GuardOutcome::Applied(record.version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded(total: u32) -> (InMemoryStockStore, SkuId) {
        let store = InMemoryStockStore::new();
        let sku = SkuId::new(1);
        store
            .insert(StockRecord::provision(sku, total))
            .await
            .unwrap();
        (store, sku)
    }

    #[tokio::test]
    async fn insert_rejects_duplicates() {
        let (store, sku) = seeded(10).await;
        let result = store.insert(StockRecord::provision(sku, 3)).await;
        assert!(matches!(result, Err(StockError::AlreadyExists(_))));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn reserve_applies_when_guard_matches() {
        let (store, sku) = seeded(10).await;
        let outcome = store
            .try_reserve(sku, 4, Version::initial())
            .await
            .unwrap();
        assert_eq!(outcome, GuardOutcome::Applied(Version::new(1)));

        let record = store.get(sku).await.unwrap().unwrap();
        assert_eq!(record.available, 6);
        assert_eq!(record.locked, 4);
    }

    #[tokio::test]
    async fn reserve_rejects_stale_version() {
        let (store, sku) = seeded(10).await;
        store
            .try_reserve(sku, 1, Version::initial())
            .await
            .unwrap();

        let outcome = store
            .try_reserve(sku, 1, Version::initial())
            .await
            .unwrap();
        assert_eq!(outcome, GuardOutcome::Rejected);

        let record = store.get(sku).await.unwrap().unwrap();
        assert_eq!(record.locked, 1);
        assert_eq!(record.version, Version::new(1));
    }

    #[tokio::test]
    async fn reserve_rejects_when_available_is_short() {
        let (store, sku) = seeded(2).await;
        let outcome = store
            .try_reserve(sku, 3, Version::initial())
            .await
            .unwrap();
        assert_eq!(outcome, GuardOutcome::Rejected);
    }

    #[tokio::test]
    async fn release_is_guarded_by_locked() {
        let (store, sku) = seeded(5).await;
        assert_eq!(
            store.try_release(sku, 1).await.unwrap(),
            GuardOutcome::Rejected
        );

        store
            .try_reserve(sku, 3, Version::initial())
            .await
            .unwrap();
        assert_eq!(
            store.try_release(sku, 3).await.unwrap(),
            GuardOutcome::Applied(Version::new(2))
        );

        let record = store.get(sku).await.unwrap().unwrap();
        assert_eq!(record.available, 5);
        assert_eq!(record.locked, 0);
    }

    #[tokio::test]
    async fn missing_sku_is_rejected() {
        let store = InMemoryStockStore::new();
        let sku = SkuId::new(99);
        assert_eq!(
            store.try_reserve(sku, 1, Version::initial()).await.unwrap(),
            GuardOutcome::Rejected
        );
        assert_eq!(
            store.try_release(sku, 1).await.unwrap(),
            GuardOutcome::Rejected
        );
        assert!(store.get(sku).await.unwrap().is_none());
    }
}
