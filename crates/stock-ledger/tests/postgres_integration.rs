//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p stock-ledger --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use sqlx::PgPool;
use stock_ledger::{
    GuardOutcome, PostgresStockStore, RetryPolicy, SkuId, StockError, StockLedger, StockRecord,
    StockStore, Version,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/001_create_stock_table.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresStockStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(8)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE stock")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStockStore::new(pool)
}

#[tokio::test]
async fn insert_and_get_record() {
    let store = get_test_store().await;
    let sku = SkuId::new(1);

    store.insert(StockRecord::provision(sku, 10)).await.unwrap();

    let record = store.get(sku).await.unwrap().unwrap();
    assert_eq!(record.total, 10);
    assert_eq!(record.available, 10);
    assert_eq!(record.locked, 0);
    assert_eq!(record.version, Version::initial());

    assert!(store.get(SkuId::new(2)).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_insert_is_already_exists() {
    let store = get_test_store().await;
    let sku = SkuId::new(1);

    store.insert(StockRecord::provision(sku, 1)).await.unwrap();
    let result = store.insert(StockRecord::provision(sku, 1)).await;
    assert!(matches!(result, Err(StockError::AlreadyExists(_))));
}

#[tokio::test]
async fn guarded_reserve_rejects_stale_version() {
    let store = get_test_store().await;
    let sku = SkuId::new(1);
    store.insert(StockRecord::provision(sku, 5)).await.unwrap();

    assert_eq!(
        store.try_reserve(sku, 2, Version::initial()).await.unwrap(),
        GuardOutcome::Applied(Version::new(1))
    );
    assert_eq!(
        store.try_reserve(sku, 2, Version::initial()).await.unwrap(),
        GuardOutcome::Rejected
    );
    assert_eq!(
        store.try_reserve(sku, 4, Version::new(1)).await.unwrap(),
        GuardOutcome::Rejected
    );

    let record = store.get(sku).await.unwrap().unwrap();
    assert_eq!((record.available, record.locked), (3, 2));
}

#[tokio::test]
async fn ledger_round_trip_bumps_version_twice() {
    let ledger = StockLedger::new(get_test_store().await);
    let sku = SkuId::new(1);
    ledger.create_stock(sku, 10).await.unwrap();

    ledger.reserve(sku, 4).await.unwrap();
    ledger.release(sku, 4).await.unwrap();

    let record = ledger.get_stock(sku).await.unwrap();
    assert_eq!((record.available, record.locked), (10, 0));
    assert_eq!(record.version, Version::new(2));

    assert!(matches!(
        ledger.release(sku, 1).await,
        Err(StockError::ReleaseRejected { locked: 0, .. })
    ));
}

#[tokio::test]
async fn concurrent_reservations_never_oversell() {
    let ledger = Arc::new(StockLedger::with_retry_policy(
        get_test_store().await,
        RetryPolicy::immediate(20),
    ));
    let sku = SkuId::new(1);
    ledger.create_stock(sku, 15).await.unwrap();

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.reserve(sku, 2).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) => assert!(matches!(e, StockError::InsufficientStock { .. })),
        }
    }
    assert_eq!(succeeded, 7);

    let record = ledger.get_stock(sku).await.unwrap();
    assert_eq!((record.available, record.locked), (1, 14));
}
