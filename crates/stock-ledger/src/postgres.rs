use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    MAX_QUANTITY, Result, SkuId, StockError, StockRecord, Version,
    store::{GuardOutcome, StockStore},
};

/// PostgreSQL-backed stock store.
///
/// Guards are expressed in the `WHERE` clause of a single `UPDATE`, so the
/// database evaluates guard and write atomically per row.
#[derive(Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    /// Creates a new PostgreSQL stock store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<StockRecord> {
        let sku_id = SkuId::new(row.try_get("sku_id")?);
        let record = StockRecord {
            sku_id,
            total: counter(sku_id, "total", row.try_get("total")?)?,
            available: counter(sku_id, "available", row.try_get("available")?)?,
            locked: counter(sku_id, "locked", row.try_get("locked")?)?,
            version: Version::new(row.try_get("version")?),
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        };
        record.validate()?;
        Ok(record)
    }
}

fn counter(sku_id: SkuId, column: &str, value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| StockError::InvalidRecord {
        sku_id,
        reason: format!("{column} is negative ({value})"),
    })
}

fn bind_quantity(quantity: u32) -> Result<i32> {
    if quantity > MAX_QUANTITY {
        return Err(StockError::InvalidQuantity(quantity));
    }
    Ok(quantity as i32)
}

#[async_trait]
impl StockStore for PostgresStockStore {
    async fn insert(&self, record: StockRecord) -> Result<()> {
        record.validate()?;
        let sku_id = record.sku_id;

        sqlx::query(
            r#"
            INSERT INTO stock (sku_id, total, available, locked, version, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(sku_id.as_i64())
        .bind(bind_quantity(record.total)?)
        .bind(bind_quantity(record.available)?)
        .bind(bind_quantity(record.locked)?)
        .bind(record.version.as_i64())
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StockError::AlreadyExists(sku_id);
            }
            StockError::Database(e)
        })?;

        Ok(())
    }

    async fn get(&self, sku_id: SkuId) -> Result<Option<StockRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT sku_id, total, available, locked, version, updated_at
            FROM stock
            WHERE sku_id = $1
            "#,
        )
        .bind(sku_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn try_reserve(
        &self,
        sku_id: SkuId,
        quantity: u32,
        expected: Version,
    ) -> Result<GuardOutcome> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE stock
            SET available = available - $1,
                locked = locked + $1,
                version = version + 1,
                updated_at = NOW()
            WHERE sku_id = $2 AND available >= $1 AND version = $3
            RETURNING version
            "#,
        )
        .bind(bind_quantity(quantity)?)
        .bind(sku_id.as_i64())
        .bind(expected.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match version {
            Some(v) => GuardOutcome::Applied(Version::new(v)),
            None => GuardOutcome::Rejected,
        })
    }

    async fn try_release(&self, sku_id: SkuId, quantity: u32) -> Result<GuardOutcome> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE stock
            SET available = available + $1,
                locked = locked - $1,
                version = version + 1,
                updated_at = NOW()
            WHERE sku_id = $2 AND locked >= $1
            RETURNING version
            "#,
        )
        .bind(bind_quantity(quantity)?)
        .bind(sku_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match version {
            Some(v) => GuardOutcome::Applied(Version::new(v)),
            None => GuardOutcome::Rejected,
        })
    }
}
