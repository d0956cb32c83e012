//! Concurrent reservation tests against the in-memory store.

use std::sync::Arc;

use stock_ledger::{InMemoryStockStore, RetryPolicy, SkuId, StockError, StockLedger, Version};

const TASKS: u32 = 20;

fn contended_ledger() -> Arc<StockLedger<InMemoryStockStore>> {
    // Every lost race means another task won, so TASKS + 1 attempts can never run dry.
    Arc::new(StockLedger::with_retry_policy(
        InMemoryStockStore::new(),
        RetryPolicy::immediate(TASKS + 1),
    ))
}

async fn reserve_concurrently(
    ledger: &Arc<StockLedger<InMemoryStockStore>>,
    sku: SkuId,
    quantity: u32,
) -> Vec<Result<Version, StockError>> {
    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let ledger = Arc::clone(ledger);
            tokio::spawn(async move { ledger.reserve(sku, quantity).await })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn oversubscribed_sku_admits_exactly_what_fits() {
    let ledger = contended_ledger();
    let sku = SkuId::new(1);
    ledger.create_stock(sku, 50).await.unwrap();

    let results = reserve_concurrently(&ledger, sku, 3).await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 16);

    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            result,
            Err(StockError::InsufficientStock { requested: 3, .. })
        ));
    }

    let record = ledger.get_stock(sku).await.unwrap();
    assert_eq!(record.locked, 48);
    assert_eq!(record.available, 2);
    assert_eq!(record.version, Version::new(16));
    assert!(record.available + record.locked <= record.total);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn each_success_gets_a_distinct_version() {
    let ledger = contended_ledger();
    let sku = SkuId::new(2);
    ledger.create_stock(sku, 100).await.unwrap();

    let results = reserve_concurrently(&ledger, sku, 1).await;

    let mut versions: Vec<i64> = results
        .into_iter()
        .map(|r| r.unwrap().as_i64())
        .collect();
    versions.sort_unstable();
    assert_eq!(versions, (1..=i64::from(TASKS)).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_reserve_and_release_keep_counters_consistent() {
    let ledger = contended_ledger();
    let sku = SkuId::new(3);
    ledger.create_stock(sku, 10).await.unwrap();

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                if ledger.reserve(sku, 2).await.is_ok() {
                    ledger.release(sku, 2).await.unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    let record = ledger.get_stock(sku).await.unwrap();
    assert_eq!(record.available, 10);
    assert_eq!(record.locked, 0);
    assert_eq!(record.version.as_i64() % 2, 0);
}

#[tokio::test]
async fn scenario_full_reservation_then_shortage() {
    let ledger = StockLedger::new(InMemoryStockStore::new());
    let sku = SkuId::new(4);
    ledger.create_stock(sku, 10).await.unwrap();

    assert_eq!(ledger.reserve(sku, 10).await.unwrap(), Version::new(1));
    let record = ledger.get_stock(sku).await.unwrap();
    assert_eq!((record.available, record.locked), (0, 10));

    assert!(matches!(
        ledger.reserve(sku, 1).await,
        Err(StockError::InsufficientStock { available: 0, .. })
    ));
}
